//! Contract tests for IdentityClient against a mock Backend API.
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | GET    | `/v1/users` | `list_users_*` |
//! | GET    | `/v1/users/{id}` | `get_user_*` |
//! | POST   | `/v1/invitations` | `create_invitation_*` |

use tucson_identity::{
    IdentityApiConfig, IdentityApiError, IdentityClient, IdentityDirectory, InvitationRequest,
};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(mock_server: &MockServer) -> IdentityClient {
    let config = IdentityApiConfig::new(&mock_server.uri(), "sk_test_123").unwrap();
    IdentityClient::new(config).unwrap()
}

fn user_json(id: &str, email: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "first_name": "Ada",
        "last_name": "Lovelace",
        "email_addresses": [{"id": format!("idn_{id}"), "email_address": email}],
        "primary_email_address_id": format!("idn_{id}"),
        "phone_numbers": [],
        "public_metadata": {},
        "created_at": 1_700_000_000_000_i64
    })
}

// ── GET /v1/users ────────────────────────────────────────────────────

#[tokio::test]
async fn list_users_sends_bearer_and_pagination() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .and(query_param("limit", "100"))
        .and(query_param("offset", "0"))
        .and(header("authorization", "Bearer sk_test_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            user_json("user_1", "ada@example.com"),
            user_json("user_2", "grace@example.com"),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let users = client.list_users(100, 0).await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].id, "user_1");
    assert_eq!(users[1].primary_email(), Some("grace@example.com"));
}

#[tokio::test]
async fn list_users_accepts_paginated_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [user_json("user_9", "nine@example.com")],
            "total_count": 1
        })))
        .mount(&mock_server)
        .await;

    let users = test_client(&mock_server).users().list(10, 0).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, "user_9");
}

#[tokio::test]
async fn list_users_surfaces_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&mock_server)
        .await;

    match test_client(&mock_server).list_users(100, 0).await.unwrap_err() {
        IdentityApiError::ApiError { status, body, .. } => {
            assert_eq!(status, 401);
            assert_eq!(body, "unauthorized");
        }
        other => panic!("expected ApiError, got: {other:?}"),
    }
}

#[tokio::test]
async fn list_users_reports_connection_failure() {
    // Nothing listens on port 9 of the loopback interface.
    let config = IdentityApiConfig::new("http://127.0.0.1:9", "sk_test").unwrap();
    let client = IdentityClient::new(config).unwrap();
    let err = client.list_users(100, 0).await.unwrap_err();
    assert!(matches!(err, IdentityApiError::Http { .. }));
}

// ── GET /v1/users/{id} ───────────────────────────────────────────────

#[tokio::test]
async fn get_user_returns_user_when_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/user_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("user_1", "ada@example.com")))
        .mount(&mock_server)
        .await;

    let user = test_client(&mock_server).get_user("user_1").await.unwrap().unwrap();
    assert_eq!(user.first_name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn get_user_returns_none_on_404() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/user_missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    assert!(test_client(&mock_server)
        .get_user("user_missing")
        .await
        .unwrap()
        .is_none());
}

// ── POST /v1/invitations ─────────────────────────────────────────────

#[tokio::test]
async fn create_invitation_posts_email_and_role() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/invitations"))
        .and(body_json(serde_json::json!({
            "email_address": "new@example.com",
            "public_metadata": {"role": "ADMIN"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "inv_1",
            "email_address": "new@example.com",
            "status": "pending"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let req = InvitationRequest {
        email_address: "new@example.com".into(),
        public_metadata: serde_json::json!({"role": "ADMIN"}),
        redirect_url: None,
    };
    let invitation = test_client(&mock_server).create_invitation(&req).await.unwrap();
    assert_eq!(invitation.id, "inv_1");
    assert_eq!(invitation.status.as_deref(), Some("pending"));
}

#[tokio::test]
async fn create_invitation_handles_duplicate() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/invitations"))
        .respond_with(ResponseTemplate::new(422).set_body_string("duplicate_record"))
        .mount(&mock_server)
        .await;

    let req = InvitationRequest {
        email_address: "dup@example.com".into(),
        public_metadata: serde_json::Value::Null,
        redirect_url: None,
    };
    let err = test_client(&mock_server).invitations().create(&req).await.unwrap_err();
    assert!(matches!(err, IdentityApiError::ApiError { status: 422, .. }));
}
