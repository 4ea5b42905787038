//! HTTP client for the Tucson API.
//!
//! One method per endpoint. Each request carries the bearer token from the
//! session's [`TokenProvider`]. Requests are not retried; a failure
//! surfaces to the caller as a [`ClientError`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tucson_core::{Document, DocumentType, Role, ScanStatus, User};
use tucson_state::{FileAttachment, ReviewDecision, SubmissionFields, Verification, VerificationStatus};
use uuid::Uuid;

use crate::error::{api_error, ClientError};
use crate::session::TokenProvider;
use crate::types::*;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct TucsonClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for TucsonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TucsonClient")
            .field("base_url", &self.base_url)
            .field("signed_in", &self.tokens.is_signed_in())
            .finish()
    }
}

impl TucsonClient {
    /// Client for the API at `base_url`. Every request asks `tokens` for a
    /// fresh bearer token.
    pub fn new(base_url: &str, tokens: Arc<dyn TokenProvider>) -> Result<Self, ClientError> {
        let parsed =
            url::Url::parse(base_url).map_err(|_| ClientError::InvalidUrl(base_url.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    // -- Plumbing -------------------------------------------------------------

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.tokens.token().await?.ok_or(ClientError::NotSignedIn)?;
        Ok(self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(token))
    }

    async fn send(&self, endpoint: &str, req: RequestBuilder) -> Result<Response, ClientError> {
        let resp = req.send().await.map_err(|e| ClientError::Http {
            endpoint: endpoint.to_string(),
            source: e,
        })?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(endpoint, status, "API request failed");
        Err(api_error(endpoint.to_string(), status, &body))
    }

    async fn decode<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T, ClientError> {
        resp.json().await.map_err(|e| ClientError::Deserialization {
            endpoint: endpoint.to_string(),
            source: e,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let endpoint = format!("GET {path}");
        let req = self.request(Method::GET, path).await?;
        let resp = self.send(&endpoint, req).await?;
        Self::decode(&endpoint, resp).await
    }

    async fn get_query<T: DeserializeOwned, Q: Serialize>(&self, path: &str, query: &Q) -> Result<T, ClientError> {
        let endpoint = format!("GET {path}");
        let req = self.request(Method::GET, path).await?.query(query);
        let resp = self.send(&endpoint, req).await?;
        Self::decode(&endpoint, resp).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let endpoint = format!("{method} {path}");
        let req = self.request(method, path).await?.json(body);
        let resp = self.send(&endpoint, req).await?;
        Self::decode(&endpoint, resp).await
    }

    /// Like [`Self::send_json`] for endpoints that wrap their result in
    /// `{success, data}`.
    async fn send_enveloped<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let envelope: Envelope<T> = self.send_json(method, path, body).await?;
        Ok(envelope.data)
    }

    // -- Self service ---------------------------------------------------------

    /// The caller's account and profile.
    ///
    /// Calls `GET {base_url}/users/profile`.
    pub async fn get_profile(&self) -> Result<ProfileView, ClientError> {
        self.get_json("/users/profile").await
    }

    /// Edit account and profile fields. Absent fields are left alone.
    ///
    /// Calls `PUT {base_url}/users/profile`.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<ProfileView, ClientError> {
        self.send_enveloped(Method::PUT, "/users/profile", update).await
    }

    /// Free-form preferences object, `{}` when none are stored.
    ///
    /// Calls `GET {base_url}/users/preferences`.
    pub async fn get_preferences(&self) -> Result<serde_json::Value, ClientError> {
        let body: serde_json::Value = self.get_json("/users/preferences").await?;
        Ok(body
            .get("preferences")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})))
    }

    /// Replace the preferences object.
    ///
    /// Calls `PUT {base_url}/users/preferences`.
    pub async fn update_preferences(&self, preferences: serde_json::Value) -> Result<serde_json::Value, ClientError> {
        let body: serde_json::Value = self
            .send_enveloped(
                Method::PUT,
                "/users/preferences",
                &serde_json::json!({ "preferences": preferences }),
            )
            .await?;
        Ok(body
            .get("preferences")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})))
    }

    // -- Verification ---------------------------------------------------------

    /// Accreditation status with the current request and past ones.
    ///
    /// Calls `GET {base_url}/verification/status`.
    pub async fn verification_status(&self) -> Result<AccreditationStatus, ClientError> {
        self.get_json("/verification/status").await
    }

    /// Open a request, or resubmit one awaiting resubmission.
    ///
    /// Calls `POST {base_url}/verification/submit`.
    pub async fn submit_verification(&self, fields: &SubmissionFields) -> Result<SubmitResult, ClientError> {
        self.send_enveloped(Method::POST, "/verification/submit", fields)
            .await
    }

    /// Attach files to a request: one `documents` part per file plus a
    /// `documentTypes` JSON array in the same order. Safe to call again
    /// when a previous upload for the same request failed.
    ///
    /// Calls `POST {base_url}/verification/{verification_id}/documents`.
    pub async fn upload_documents(
        &self,
        verification_id: Uuid,
        documents: &[(FileAttachment, DocumentType)],
    ) -> Result<Vec<Document>, ClientError> {
        let path = format!("/verification/{verification_id}/documents");
        let endpoint = format!("POST {path}");

        let types: Vec<DocumentType> = documents.iter().map(|(_, t)| *t).collect();
        let types_json = serde_json::json!(types).to_string();
        let mut form = Form::new();
        for (file, _) in documents {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime_type)
                .map_err(|e| ClientError::Http {
                    endpoint: endpoint.clone(),
                    source: e,
                })?;
            form = form.part("documents", part);
        }
        form = form.text("documentTypes", types_json);

        let req = self.request(Method::POST, &path).await?.multipart(form);
        let resp = self.send(&endpoint, req).await?;
        let envelope: Envelope<UploadedDocuments> = Self::decode(&endpoint, resp).await?;
        Ok(envelope.data.documents)
    }

    // -- Review console -------------------------------------------------------

    /// One page of requests with per-status counts.
    ///
    /// Calls `GET {base_url}/admin/verifications?page&limit&status&type&search`.
    pub async fn list_verifications(&self, filter: &VerificationFilter) -> Result<VerificationPage, ClientError> {
        self.get_query("/admin/verifications", filter).await
    }

    /// Calls `GET {base_url}/admin/verifications/stats`.
    pub async fn verification_stats(&self) -> Result<StatusCounts, ClientError> {
        self.get_json("/admin/verifications/stats").await
    }

    /// Request detail with its owner and audit trail.
    ///
    /// Calls `GET {base_url}/admin/verifications/{id}`.
    pub async fn get_verification(&self, id: Uuid) -> Result<VerificationDetail, ClientError> {
        self.get_json(&format!("/admin/verifications/{id}")).await
    }

    /// Send an already validated decision.
    ///
    /// Calls `PUT {base_url}/admin/verifications/{id}/review`.
    pub async fn review_verification(&self, id: Uuid, decision: &ReviewDecision) -> Result<Verification, ClientError> {
        self.send_enveloped(
            Method::PUT,
            &format!("/admin/verifications/{id}/review"),
            &decision_body(decision),
        )
        .await
    }

    /// Send an already validated batch decision.
    ///
    /// Calls `POST {base_url}/admin/verifications/batch-review`.
    pub async fn batch_review(&self, ids: &[Uuid], decision: &ReviewDecision) -> Result<BatchOutcome, ClientError> {
        let mut body = decision_body(decision);
        body["verificationIds"] = serde_json::json!(ids);
        self.send_json(Method::POST, "/admin/verifications/batch-review", &body)
            .await
    }

    /// Raw bytes of one uploaded document. Infected files are refused with 409.
    ///
    /// Calls `GET {base_url}/admin/verifications/{verification_id}/documents/{document_id}`.
    pub async fn fetch_document(&self, verification_id: Uuid, document_id: Uuid) -> Result<DocumentContent, ClientError> {
        let path = format!("/admin/verifications/{verification_id}/documents/{document_id}");
        let endpoint = format!("GET {path}");
        let req = self.request(Method::GET, &path).await?;
        let resp = self.send(&endpoint, req).await?;
        let mime_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp.bytes().await.map_err(|e| ClientError::Deserialization {
            endpoint,
            source: e,
        })?;
        Ok(DocumentContent {
            mime_type,
            bytes: bytes.to_vec(),
        })
    }

    /// Calls `PUT {base_url}/admin/verifications/{verification_id}/documents/{document_id}/scan`.
    pub async fn record_scan(
        &self,
        verification_id: Uuid,
        document_id: Uuid,
        status: ScanStatus,
    ) -> Result<Document, ClientError> {
        self.send_enveloped(
            Method::PUT,
            &format!("/admin/verifications/{verification_id}/documents/{document_id}/scan"),
            &serde_json::json!({ "status": status }),
        )
        .await
    }

    // -- User management ------------------------------------------------------

    /// Calls `GET {base_url}/admin/users?page&limit&search&role&status`.
    pub async fn list_users(&self, filter: &UserFilter) -> Result<UserPage, ClientError> {
        self.get_query("/admin/users", filter).await
    }

    /// Account with profile and verification history.
    ///
    /// Calls `GET {base_url}/admin/users/{id}`.
    pub async fn get_user(&self, id: Uuid) -> Result<UserDetail, ClientError> {
        self.get_json(&format!("/admin/users/{id}")).await
    }

    /// Create a PENDING account and send an invitation.
    ///
    /// Calls `POST {base_url}/admin/users`.
    pub async fn invite_user(&self, invite: &Invite) -> Result<User, ClientError> {
        self.send_enveloped(Method::POST, "/admin/users", invite).await
    }

    /// Calls `PUT {base_url}/admin/users/{id}`.
    pub async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<User, ClientError> {
        self.send_enveloped(Method::PUT, &format!("/admin/users/{id}"), update)
            .await
    }

    /// Calls `PUT {base_url}/admin/users/{id}/role`.
    pub async fn change_role(&self, id: Uuid, role: Role) -> Result<User, ClientError> {
        self.send_enveloped(
            Method::PUT,
            &format!("/admin/users/{id}/role"),
            &serde_json::json!({ "role": role }),
        )
        .await
    }

    /// Delete an account with its profile, requests and documents.
    ///
    /// Calls `DELETE {base_url}/admin/users/{id}`.
    pub async fn delete_user(&self, id: Uuid) -> Result<DeletedUser, ClientError> {
        let path = format!("/admin/users/{id}");
        let endpoint = format!("DELETE {path}");
        let req = self.request(Method::DELETE, &path).await?;
        let resp = self.send(&endpoint, req).await?;
        let envelope: Envelope<DeletedUser> = Self::decode(&endpoint, resp).await?;
        Ok(envelope.data)
    }

    /// Create local accounts for identity-provider users that lack one.
    ///
    /// Calls `POST {base_url}/admin/users/sync-clerk`.
    pub async fn sync_users(&self) -> Result<SyncReport, ClientError> {
        self.send_enveloped(Method::POST, "/admin/users/sync-clerk", &serde_json::json!({}))
            .await
    }
}

#[derive(serde::Deserialize)]
struct UploadedDocuments {
    documents: Vec<Document>,
}

/// Request body for a review decision.
fn decision_body(decision: &ReviewDecision) -> serde_json::Value {
    let (status, notes, reason) = match decision {
        ReviewDecision::StartReview { notes } => (VerificationStatus::InReview, notes.as_deref(), None),
        ReviewDecision::Approve { notes } => (VerificationStatus::Approved, notes.as_deref(), None),
        ReviewDecision::Reject { reason, notes } => {
            (VerificationStatus::Rejected, notes.as_deref(), Some(reason.as_str()))
        }
        ReviewDecision::RequestResubmission { notes } => {
            (VerificationStatus::ResubmissionRequired, Some(notes.as_str()), None)
        }
    };
    serde_json::json!({
        "status": status,
        "notes": notes,
        "rejectionReason": reason,
    })
}
