//! Contract tests for the Tucson client against a mock API.
//!
//! ## Covered
//!
//! | Area | Test |
//! |------|------|
//! | submit + upload ordering | `submit_posts_fields_then_uploads_documents` |
//! | upload retry | `failed_upload_retries_without_resubmitting` |
//! | local validation | `net_worth_below_threshold_sends_nothing` |
//! | error messages | `submit_failure_*` |
//! | review validation | `rejection_without_reason_sends_nothing` |
//! | policy gating | `admin_role_change_is_refused_locally` |
//! | confirmation | `delete_*` |
//! | profile cache | `concurrent_profile_reads_share_one_request` |

use std::sync::Arc;
use std::time::Duration;

use tucson_client::{
    retry_upload, submit, AdminConsole, AlwaysConfirm, ClientError, Session, StaticToken,
    TucsonClient, SUBMIT_FALLBACK, UPLOAD_FALLBACK,
};
use tucson_core::{DenyReason, DocumentType, Role, User, UserStatus, VerificationType};
use tucson_state::{FileAttachment, VerificationStatus, VerificationWizard};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> TucsonClient {
    TucsonClient::new(&server.uri(), Arc::new(StaticToken::new("user_1", "secret"))).unwrap()
}

fn user(role: Role) -> User {
    User::new(
        format!("{}@example.com", role.as_str().to_lowercase()),
        "Test".into(),
        "User".into(),
        role,
        UserStatus::Active,
    )
}

fn income_wizard() -> VerificationWizard {
    let mut w = VerificationWizard::new();
    w.select_method(VerificationType::Income);
    w.set_annual_income("$250,000");
    w.set_income_source("Salary");
    w.add_files([FileAttachment::new(
        "w2.pdf",
        "application/pdf",
        b"%PDF-1.4".to_vec(),
    )]);
    w.set_document_type(0, DocumentType::W2);
    w.set_attestation(true);
    w.set_consent(true);
    w
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}

// ── Submission ───────────────────────────────────────────────────────

#[tokio::test]
async fn submit_posts_fields_then_uploads_documents() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/verification/submit"))
        .and(header("authorization", "Bearer user_1:secret"))
        .and(body_partial_json(serde_json::json!({
            "verificationType": "INCOME",
            "annualIncome": 250000,
            "incomeSource": "Salary",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "success": true,
            "data": { "id": id, "status": "PENDING" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/verification/{id}/documents")))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "success": true,
            "data": { "documents": [] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let submitted = submit(&client(&server), &income_wizard()).await.unwrap();
    assert_eq!(submitted.verification_id, id);

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<String> = requests.iter().map(|r| r.url.path().to_string()).collect();
    assert_eq!(
        paths,
        vec![
            "/verification/submit".to_string(),
            format!("/verification/{id}/documents"),
        ]
    );

    let upload = String::from_utf8_lossy(&requests[1].body);
    assert!(upload.contains("name=\"documents\""));
    assert!(upload.contains("filename=\"w2.pdf\""));
    assert!(upload.contains("[\"W2\"]"));
}

#[tokio::test]
async fn failed_upload_retries_without_resubmitting() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/verification/submit"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "success": true,
            "data": { "id": id, "status": "PENDING" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    // First upload attempt fails, the next one succeeds.
    Mock::given(method("POST"))
        .and(path(format!("/verification/{id}/documents")))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/verification/{id}/documents")))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "success": true,
            "data": { "documents": [] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let wizard = income_wizard();
    let err = submit(&client, &wizard).await.unwrap_err();
    assert_eq!(err.verification_id, Some(id));
    assert_eq!(err.message, UPLOAD_FALLBACK);
    assert_eq!(err.source.status(), Some(500));

    let retried = retry_upload(&client, id, &wizard).await.unwrap();
    assert_eq!(retried.verification_id, id);

    let paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/verification/submit".to_string(),
            format!("/verification/{id}/documents"),
            format!("/verification/{id}/documents"),
        ]
    );
}

#[tokio::test]
async fn net_worth_below_threshold_sends_nothing() {
    let server = MockServer::start().await;
    let mut wizard = income_wizard();
    wizard.select_method(VerificationType::NetWorth);
    wizard.set_net_worth("500000");

    let err = submit(&client(&server), &wizard).await.unwrap_err();
    assert!(err.is_local());
    assert!(err.message.starts_with("Net worth must be at least $1,000,000"));
    assert_eq!(request_count(&server).await, 0);
    // the wizard keeps its input
    assert_eq!(wizard.net_worth(), "500,000");
}

#[tokio::test]
async fn submit_failure_shows_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verification/submit"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error": { "code": "CONFLICT", "message": "You are already an accredited investor" }
        })))
        .mount(&server)
        .await;

    let err = submit(&client(&server), &income_wizard()).await.unwrap_err();
    assert_eq!(err.message, "You are already an accredited investor");
    assert_eq!(err.source.status(), Some(409));
}

#[tokio::test]
async fn submit_failure_without_message_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verification/submit"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = submit(&client(&server), &income_wizard()).await.unwrap_err();
    assert_eq!(err.message, SUBMIT_FALLBACK);
}

#[tokio::test]
async fn signed_out_session_sends_nothing() {
    let server = MockServer::start().await;
    let tokens = Arc::new(StaticToken::new("user_1", "secret"));
    let session = Session::new(&server.uri(), tokens).unwrap();
    session.sign_out();

    let err = submit(session.client(), &income_wizard()).await.unwrap_err();
    assert!(matches!(err.source, ClientError::NotSignedIn));
    assert_eq!(request_count(&server).await, 0);
}

// ── Admin console ────────────────────────────────────────────────────

#[tokio::test]
async fn rejection_without_reason_sends_nothing() {
    let server = MockServer::start().await;
    let console = AdminConsole::new(client(&server), user(Role::Admin));

    let err = console
        .review(
            Uuid::new_v4(),
            VerificationStatus::Rejected,
            Some("looks off".into()),
            Some("   ".into()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Review(_)));
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn rejection_sends_reason() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("PUT"))
        .and(path(format!("/admin/verifications/{id}/review")))
        .and(body_partial_json(serde_json::json!({
            "status": "REJECTED",
            "rejectionReason": "Income not evidenced",
        })))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error": { "code": "CONFLICT", "message": "invalid transition from APPROVED via reject" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let console = AdminConsole::new(client(&server), user(Role::Admin));
    let err = console
        .review(
            id,
            VerificationStatus::Rejected,
            None,
            Some("Income not evidenced".into()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn admin_role_change_is_refused_locally() {
    let server = MockServer::start().await;
    let console = AdminConsole::new(client(&server), user(Role::Admin));
    let target = user(Role::Investor);

    let err = console.change_role(&target, Role::Admin).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Forbidden(DenyReason::RequiresRole(Role::SuperAdmin))
    ));
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn delete_declined_sends_nothing() {
    let server = MockServer::start().await;
    let console = AdminConsole::new(client(&server), user(Role::Admin));
    let target = user(Role::Investor);

    let err = console
        .delete_user(&target, &AlwaysConfirm(false))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn delete_confirmed_calls_api() {
    let server = MockServer::start().await;
    let target = user(Role::Investor);
    Mock::given(method("DELETE"))
        .and(path(format!("/admin/users/{}", target.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": { "id": target.id, "deletedVerifications": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let console = AdminConsole::new(client(&server), user(Role::Admin));
    let deleted = console
        .delete_user(&target, &AlwaysConfirm(true))
        .await
        .unwrap();
    assert_eq!(deleted.id, target.id);
    assert_eq!(deleted.deleted_verifications, 2);
}

// ── Session ──────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_profile_reads_share_one_request() {
    let server = MockServer::start().await;
    let me = user(Role::Investor);
    Mock::given(method("GET"))
        .and(path("/users/profile"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "user": me, "profile": null }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::new(
        &server.uri(),
        Arc::new(StaticToken::new("user_1", "secret")),
    )
    .unwrap();
    let (a, b, c) = tokio::join!(session.profile(), session.profile(), session.profile());
    assert_eq!(a.unwrap().user.id, me.id);
    assert!(b.is_ok() && c.is_ok());

    session.sign_out();
    assert!(matches!(
        session.profile().await,
        Err(ClientError::NotSignedIn)
    ));
}
