//! # Integration Tests for tucson-api
//!
//! Drives the assembled router with `oneshot` requests: authentication,
//! investor submission and upload, admin review (single and batch),
//! document access, user management, and self-service profile endpoints.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use std::sync::Arc;

use async_trait::async_trait;
use tucson_api::audit::AuditAction;
use tucson_api::state::{AppConfig, AppState};
use tucson_core::{Role, User, UserStatus};
use tucson_identity::{
    IdentityApiError, IdentityDirectory, Invitation, InvitationRequest, ProviderUser,
};

const BOUNDARY: &str = "tucson-test-boundary";

/// Helper: create a local user linked to `external_id`.
fn seed_user(state: &AppState, external_id: &str, role: Role, status: UserStatus) -> User {
    let mut user = User::new(
        format!("{external_id}@example.com"),
        "Test".into(),
        external_id.into(),
        role,
        status,
    );
    user.external_id = Some(external_id.into());
    state.users.insert(user.id, user.clone());
    user
}

/// Helper: state with one user of every role, development-mode auth.
fn seeded_state() -> AppState {
    let state = AppState::new();
    seed_user(&state, "investor", Role::Investor, UserStatus::Active);
    seed_user(&state, "admin", Role::Admin, UserStatus::Active);
    seed_user(&state, "root", Role::SuperAdmin, UserStatus::Active);
    state
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::http::Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

async fn send(
    state: &AppState,
    method: &str,
    uri: &str,
    caller: Option<&str>,
    body: Option<Value>,
) -> axum::http::Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder.header("authorization", format!("Bearer {caller}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    tucson_api::app(state.clone())
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

fn income_submission() -> Value {
    json!({
        "verificationType": "INCOME",
        "annualIncome": "250000",
        "incomeSource": "Salary",
        "attestation": true,
        "consentToVerify": true
    })
}

/// Helper: build a multipart body with the given files and a documentTypes array.
fn multipart_body(files: &[(&str, &str, &[u8])], types: &[&str]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, mime, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"documents\"; filename=\"{name}\"\r\nContent-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"documentTypes\"\r\n\r\n{}\r\n--{BOUNDARY}--\r\n",
            serde_json::to_string(types).unwrap()
        )
        .as_bytes(),
    );
    body
}

async fn upload(
    state: &AppState,
    verification_id: &str,
    caller: &str,
    body: Vec<u8>,
) -> axum::http::Response<Body> {
    tucson_api::app(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/verification/{verification_id}/documents"))
                .header("authorization", format!("Bearer {caller}"))
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn submit_as_investor(state: &AppState) -> String {
    let response = send(state, "POST", "/verification/submit", Some("investor"), Some(income_submission())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    body["data"]["id"].as_str().unwrap().to_string()
}

// -- Health & Authentication --------------------------------------------------

#[tokio::test]
async fn health_check_needs_no_auth() {
    let state = AppState::new();
    let response = send(&state, "GET", "/health/check", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "not_configured");
}

#[tokio::test]
async fn missing_authorization_is_401() {
    let state = seeded_state();
    let response = send(&state, "GET", "/verification/status", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn unknown_identity_is_401() {
    let state = seeded_state();
    let response = send(&state, "GET", "/verification/status", Some("stranger"), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn configured_secret_is_enforced() {
    let config = AppConfig {
        auth_token: Some("s3cret".into()),
        ..AppConfig::default()
    };
    let state = AppState::with_config(config, None, None);
    seed_user(&state, "investor", Role::Investor, UserStatus::Active);

    let wrong = send(&state, "GET", "/verification/status", Some("investor:nope"), None).await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let bare = send(&state, "GET", "/verification/status", Some("investor"), None).await;
    assert_eq!(bare.status(), StatusCode::UNAUTHORIZED);
    let right = send(&state, "GET", "/verification/status", Some("investor:s3cret"), None).await;
    assert_eq!(right.status(), StatusCode::OK);
}

#[tokio::test]
async fn pending_account_activates_on_first_request() {
    let state = AppState::new();
    let user = seed_user(&state, "invitee", Role::Investor, UserStatus::Pending);
    let response = send(&state, "GET", "/users/profile", Some("invitee"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.users.get(&user.id).unwrap().status, UserStatus::Active);
    assert_eq!(state.audit.with_action(AuditAction::UserActivated).len(), 1);
}

#[tokio::test]
async fn suspended_account_is_403() {
    let state = AppState::new();
    seed_user(&state, "banned", Role::Admin, UserStatus::Suspended);
    let response = send(&state, "GET", "/admin/verifications", Some("banned"), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// -- Investor Verification ----------------------------------------------------

#[tokio::test]
async fn submit_then_status_reports_pending() {
    let state = seeded_state();
    let id = submit_as_investor(&state).await;

    let response = send(&state, "GET", "/verification/status", Some("investor"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["isAccredited"], false);
    assert_eq!(body["currentVerification"]["id"], id.as_str());
    assert_eq!(body["currentVerification"]["status"], "PENDING");
    assert_eq!(body["verificationHistory"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn second_open_submission_is_409() {
    let state = seeded_state();
    submit_as_investor(&state).await;
    let response = send(&state, "POST", "/verification/submit", Some("investor"), Some(income_submission())).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(state.verifications.len(), 1);
}

#[tokio::test]
async fn income_below_threshold_is_422() {
    let state = seeded_state();
    let mut submission = income_submission();
    submission["annualIncome"] = json!(150000);
    let response = send(&state, "POST", "/verification/submit", Some("investor"), Some(submission)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(state.verifications.is_empty());
}

#[tokio::test]
async fn upload_rejects_unsupported_type_and_missing_types() {
    let state = seeded_state();
    let id = submit_as_investor(&state).await;

    let exe = upload(
        &state,
        &id,
        "investor",
        multipart_body(&[("setup.exe", "application/x-msdownload", b"MZ")], &["W2"]),
    )
    .await;
    assert_eq!(exe.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let untyped = upload(
        &state,
        &id,
        "investor",
        multipart_body(&[("w2.pdf", "application/pdf", b"%PDF-1.4")], &[]),
    )
    .await;
    assert_eq!(untyped.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(state.verifications.get(&id.parse().unwrap()).unwrap().documents.is_empty());
}

#[tokio::test]
async fn other_users_verification_is_404_for_upload() {
    let state = seeded_state();
    seed_user(&state, "other", Role::Investor, UserStatus::Active);
    let id = submit_as_investor(&state).await;
    let response = upload(
        &state,
        &id,
        "other",
        multipart_body(&[("w2.pdf", "application/pdf", b"%PDF-1.4")], &["W2"]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -- Review Console -----------------------------------------------------------

#[tokio::test]
async fn investor_cannot_open_review_console() {
    let state = seeded_state();
    let response = send(&state, "GET", "/admin/verifications", Some("investor"), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "role 'ADMIN' required");
}

#[tokio::test]
async fn upload_then_admin_fetches_document_until_infected() {
    let state = seeded_state();
    let id = submit_as_investor(&state).await;

    let response = upload(
        &state,
        &id,
        "investor",
        multipart_body(&[("w2.pdf", "application/pdf", b"%PDF-1.4 body")], &["W2"]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let doc_id = body["data"]["documents"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["documents"][0]["virusScanStatus"], "PENDING");

    let uri = format!("/admin/verifications/{id}/documents/{doc_id}");
    let response = send(&state, "GET", &uri, Some("admin"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    assert_eq!(body_string(response).await, "%PDF-1.4 body");

    let scan = send(&state, "PUT", &format!("{uri}/scan"), Some("admin"), Some(json!({"status": "INFECTED"}))).await;
    assert_eq!(scan.status(), StatusCode::OK);

    let response = send(&state, "GET", &uri, Some("admin"), None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn approve_grants_accreditation_and_second_review_conflicts() {
    let state = seeded_state();
    let id = submit_as_investor(&state).await;
    let uri = format!("/admin/verifications/{id}/review");

    let response = send(&state, "PUT", &uri, Some("admin"), Some(json!({"status": "APPROVED"}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "APPROVED");
    assert!(body["data"]["expiresAt"].is_string());

    let again = send(&state, "PUT", &uri, Some("admin"), Some(json!({"status": "REJECTED", "rejectionReason": "late"}))).await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let status = body_json(send(&state, "GET", "/verification/status", Some("investor"), None).await).await;
    assert_eq!(status["isAccredited"], true);

    let blocked = send(&state, "POST", "/verification/submit", Some("investor"), Some(income_submission())).await;
    assert_eq!(blocked.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(blocked).await["error"]["message"],
        "You are already an accredited investor"
    );
}

/// A pool whose every connection attempt fails quickly.
fn unreachable_pool() -> sqlx::PgPool {
    sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_millis(200))
        .connect_lazy("postgres://tucson@127.0.0.1:1/tucson")
        .unwrap()
}

#[tokio::test]
async fn review_that_cannot_be_stored_is_not_applied() {
    let mut state = seeded_state();
    let id = submit_as_investor(&state).await;
    state.db_pool = Some(unreachable_pool());

    let uri = format!("/admin/verifications/{id}/review");
    let response = send(&state, "PUT", &uri, Some("admin"), Some(json!({"status": "APPROVED"}))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let stored = state.verifications.get(&id.parse().unwrap()).unwrap();
    assert_eq!(stored.status, tucson_state::VerificationStatus::Pending);
    assert!(stored.reviewed_by.is_none());
    assert!(state.audit.with_action(AuditAction::VerificationReviewed).is_empty());

    // The same decision goes through once storage is back.
    state.db_pool = None;
    let retry = send(&state, "PUT", &uri, Some("admin"), Some(json!({"status": "APPROVED"}))).await;
    assert_eq!(retry.status(), StatusCode::OK);
}

#[tokio::test]
async fn submission_that_cannot_be_stored_leaves_no_request() {
    let mut state = seeded_state();
    state.db_pool = Some(unreachable_pool());
    let response = send(&state, "POST", "/verification/submit", Some("investor"), Some(income_submission())).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(state.verifications.is_empty());
}

#[tokio::test]
async fn reject_without_reason_is_422_and_changes_nothing() {
    let state = seeded_state();
    let id = submit_as_investor(&state).await;
    let response = send(
        &state,
        "PUT",
        &format!("/admin/verifications/{id}/review"),
        Some("admin"),
        Some(json!({"status": "REJECTED", "rejectionReason": "   "})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let stored = state.verifications.get(&id.parse().unwrap()).unwrap();
    assert_eq!(stored.status.as_str(), "PENDING");
}

#[tokio::test]
async fn resubmission_round_trip_keeps_the_same_request() {
    let state = seeded_state();
    let id = submit_as_investor(&state).await;
    let response = send(
        &state,
        "PUT",
        &format!("/admin/verifications/{id}/review"),
        Some("admin"),
        Some(json!({"status": "RESUBMISSION_REQUIRED", "notes": "Upload a clearer W-2"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&state, "POST", "/verification/submit", Some("investor"), Some(income_submission())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["id"], id.as_str());
    assert_eq!(body["data"]["status"], "PENDING");
    assert_eq!(state.verifications.len(), 1);
}

#[tokio::test]
async fn batch_review_isolates_missing_ids() {
    let state = seeded_state();
    let id = submit_as_investor(&state).await;
    let missing = uuid::Uuid::new_v4();

    let response = send(
        &state,
        "POST",
        "/admin/verifications/batch-review",
        Some("admin"),
        Some(json!({
            "verificationIds": [id, missing],
            "status": "REJECTED",
            "notes": "Insufficient evidence"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["successCount"], 1);
    assert_eq!(body["failureCount"], 1);
    assert_eq!(body["successful"][0], id.as_str());
    assert_eq!(body["failed"][0]["id"], missing.to_string());
    assert_eq!(body["failed"][0]["error"], "Verification not found");

    let stored = state.verifications.get(&id.parse().unwrap()).unwrap();
    assert_eq!(stored.rejection_reason.as_deref(), Some("Insufficient evidence"));
}

#[tokio::test]
async fn batch_review_rejects_in_review_target() {
    let state = seeded_state();
    let id = submit_as_investor(&state).await;
    let response = send(
        &state,
        "POST",
        "/admin/verifications/batch-review",
        Some("admin"),
        Some(json!({"verificationIds": [id], "status": "IN_REVIEW"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn list_filters_and_counts() {
    let state = seeded_state();
    let id = submit_as_investor(&state).await;
    seed_user(&state, "second", Role::Investor, UserStatus::Active);
    let response = send(&state, "POST", "/verification/submit", Some("second"), Some(json!({
        "verificationType": "NET_WORTH",
        "netWorth": 2500000,
        "attestation": true,
        "consentToVerify": true
    }))).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&state, "GET", "/admin/verifications?type=INCOME&limit=5", Some("admin"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["id"], id.as_str());
    assert_eq!(body["data"][0]["user"]["email"], "investor@example.com");
    assert_eq!(body["counts"]["pending"], 2);
    assert_eq!(body["counts"]["total"], 2);
    assert_eq!(body["pagination"]["limit"], 5);

    let response = send(&state, "GET", "/admin/verifications?search=SECOND", Some("admin"), None).await;
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let stats = body_json(send(&state, "GET", "/admin/verifications/stats", Some("admin"), None).await).await;
    assert_eq!(stats["pending"], 2);
}

#[tokio::test]
async fn detail_includes_audit_trail() {
    let state = seeded_state();
    let id = submit_as_investor(&state).await;
    send(&state, "PUT", &format!("/admin/verifications/{id}/review"), Some("admin"), Some(json!({"status": "IN_REVIEW"}))).await;

    let response = send(&state, "GET", &format!("/admin/verifications/{id}"), Some("admin"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "IN_REVIEW");
    let trail: Vec<&str> = body["auditTrail"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(trail, vec!["VERIFICATION_SUBMITTED", "VERIFICATION_REVIEWED"]);
    assert!(state.audit.verify().chain_valid);
}

// -- User Management ----------------------------------------------------------

#[tokio::test]
async fn admin_may_not_invite_admins() {
    let state = seeded_state();
    let response = send(&state, "POST", "/admin/users", Some("admin"), Some(json!({
        "email": "new-admin@example.com",
        "role": "ADMIN"
    }))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(state.user_by_email("new-admin@example.com").is_none());
}

#[tokio::test]
async fn invite_creates_pending_user_and_rejects_duplicates() {
    let state = seeded_state();
    let body = json!({"email": " New.Investor@Example.com ", "firstName": "New"});
    let response = send(&state, "POST", "/admin/users", Some("admin"), Some(body.clone())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["data"]["email"], "new.investor@example.com");
    assert_eq!(created["data"]["status"], "PENDING");
    assert_eq!(created["data"]["role"], "INVESTOR");

    let duplicate = send(&state, "POST", "/admin/users", Some("admin"), Some(body)).await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn role_changes_need_a_super_admin() {
    let state = seeded_state();
    let investor = state.user_by_external_id("investor").unwrap();
    let uri = format!("/admin/users/{}/role", investor.id);

    let as_admin = send(&state, "PUT", &uri, Some("admin"), Some(json!({"role": "ADMIN"}))).await;
    assert_eq!(as_admin.status(), StatusCode::FORBIDDEN);

    let as_root = send(&state, "PUT", &uri, Some("root"), Some(json!({"role": "ADMIN"}))).await;
    assert_eq!(as_root.status(), StatusCode::OK);
    assert_eq!(state.users.get(&investor.id).unwrap().role, Role::Admin);

    let root = state.user_by_external_id("root").unwrap();
    let own = send(&state, "PUT", &format!("/admin/users/{}/role", root.id), Some("root"), Some(json!({"role": "ADMIN"}))).await;
    assert_eq!(own.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_cannot_touch_super_admin() {
    let state = seeded_state();
    let root = state.user_by_external_id("root").unwrap();
    let update = send(&state, "PUT", &format!("/admin/users/{}", root.id), Some("admin"), Some(json!({"status": "SUSPENDED"}))).await;
    assert_eq!(update.status(), StatusCode::FORBIDDEN);
    let delete = send(&state, "DELETE", &format!("/admin/users/{}", root.id), Some("admin"), None).await;
    assert_eq!(delete.status(), StatusCode::FORBIDDEN);
    assert!(state.users.contains(&root.id));
}

#[tokio::test]
async fn delete_cascades_and_refuses_self() {
    let state = seeded_state();
    let investor = state.user_by_external_id("investor").unwrap();
    submit_as_investor(&state).await;

    let admin = state.user_by_external_id("admin").unwrap();
    let own = send(&state, "DELETE", &format!("/admin/users/{}", admin.id), Some("admin"), None).await;
    assert_eq!(own.status(), StatusCode::FORBIDDEN);

    let response = send(&state, "DELETE", &format!("/admin/users/{}", investor.id), Some("admin"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!state.users.contains(&investor.id));
    assert!(state.verifications.is_empty());

    let again = send(&state, "DELETE", &format!("/admin/users/{}", investor.id), Some("admin"), None).await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

/// Identity provider that knows a fixed set of users and accepts every
/// invitation.
struct Directory(Vec<ProviderUser>);

#[async_trait]
impl IdentityDirectory for Directory {
    async fn list_users(&self, _limit: u32, _offset: u32) -> Result<Vec<ProviderUser>, IdentityApiError> {
        Ok(self.0.clone())
    }

    async fn get_user(&self, id: &str) -> Result<Option<ProviderUser>, IdentityApiError> {
        Ok(self.0.iter().find(|u| u.id == id).cloned())
    }

    async fn create_invitation(&self, req: &InvitationRequest) -> Result<Invitation, IdentityApiError> {
        Ok(Invitation {
            id: "inv_1".into(),
            email_address: req.email_address.clone(),
            status: Some("pending".into()),
        })
    }
}

fn provider_user(id: &str, email: &str) -> ProviderUser {
    serde_json::from_value(json!({
        "id": id,
        "email_addresses": [{"id": "idn_1", "email_address": email}],
        "primary_email_address_id": "idn_1",
    }))
    .unwrap()
}

#[tokio::test]
async fn invited_user_can_sign_in_after_sync() {
    let state = AppState::with_config(
        AppConfig::default(),
        Some(Arc::new(Directory(vec![provider_user("user_new", "new@example.com")]))),
        None,
    );
    seed_user(&state, "admin", Role::Admin, UserStatus::Active);
    seed_user(&state, "root", Role::SuperAdmin, UserStatus::Active);

    let invited = send(&state, "POST", "/admin/users", Some("admin"), Some(json!({"email": "new@example.com"}))).await;
    assert_eq!(invited.status(), StatusCode::CREATED);
    let invited_id = body_json(invited).await["data"]["id"].as_str().unwrap().to_string();

    let sync = send(&state, "POST", "/admin/users/sync-clerk", Some("root"), None).await;
    assert_eq!(sync.status(), StatusCode::OK);
    let report = body_json(sync).await;
    assert_eq!(report["data"]["alreadyExisting"], 1);
    assert_eq!(report["data"]["linked"], 1);
    assert_eq!(report["data"]["created"], 0);

    let profile = send(&state, "GET", "/users/profile", Some("user_new"), None).await;
    assert_eq!(profile.status(), StatusCode::OK);
    let body = body_json(profile).await;
    assert_eq!(body["user"]["id"], invited_id.as_str());
    assert_eq!(body["user"]["status"], "ACTIVE");
    assert_eq!(state.users.len(), 3);
}

#[tokio::test]
async fn sync_needs_super_admin_and_a_provider() {
    let state = seeded_state();
    let as_admin = send(&state, "POST", "/admin/users/sync-clerk", Some("admin"), None).await;
    assert_eq!(as_admin.status(), StatusCode::FORBIDDEN);
    let as_root = send(&state, "POST", "/admin/users/sync-clerk", Some("root"), None).await;
    assert_eq!(as_root.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn user_list_filters_by_role() {
    let state = seeded_state();
    let response = send(&state, "GET", "/admin/users?role=SUPER_ADMIN", Some("admin"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 1);
}

// -- Self Service -------------------------------------------------------------

#[tokio::test]
async fn profile_update_persists_both_records() {
    let state = seeded_state();
    let response = send(&state, "PUT", "/users/profile", Some("investor"), Some(json!({
        "city": "Tucson",
        "company": "Saguaro Partners",
        "riskTolerance": "moderate"
    }))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(send(&state, "GET", "/users/profile", Some("investor"), None).await).await;
    assert_eq!(body["user"]["city"], "Tucson");
    assert_eq!(body["profile"]["company"], "Saguaro Partners");
    assert_eq!(body["profile"]["riskTolerance"], "moderate");
}

#[tokio::test]
async fn preferences_must_be_an_object() {
    let state = seeded_state();
    let bad = send(&state, "PUT", "/users/preferences", Some("investor"), Some(json!({"preferences": [1, 2]}))).await;
    assert_eq!(bad.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let good = send(&state, "PUT", "/users/preferences", Some("investor"), Some(json!({"preferences": {"theme": "dark"}}))).await;
    assert_eq!(good.status(), StatusCode::OK);
    let body = body_json(send(&state, "GET", "/users/preferences", Some("investor"), None).await).await;
    assert_eq!(body["preferences"]["theme"], "dark");
}

#[tokio::test]
async fn openapi_is_served_to_authenticated_callers() {
    let state = seeded_state();
    let response = send(&state, "GET", "/openapi.json", Some("investor"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["paths"]["/verification/submit"].is_object());
}
