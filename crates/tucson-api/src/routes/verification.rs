//! # Investor Verification Endpoints
//!
//! | Method | Path                         | Purpose                               |
//! |--------|------------------------------|---------------------------------------|
//! | GET    | `/verification/status`       | Accreditation status and history      |
//! | POST   | `/verification/submit`       | Open a request, or resubmit one        |
//! | POST   | `/verification/:id/documents`| Multipart upload of supporting files  |
//!
//! A new request is refused while the caller has one awaiting a decision
//! or holds an unexpired approval. A request in RESUBMISSION_REQUIRED is
//! updated in place by the next submit and returns to PENDING with its
//! documents kept.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tucson_core::document::check_upload;
use tucson_core::{Action, Document, DocumentType, ScanStatus, ValidationError};
use tucson_state::{SubmissionFields, Verification, VerificationStatus};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::{AuditAction, NewAuditEvent};
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::Envelope;
use crate::state::AppState;

/// Largest multipart body accepted by the upload endpoint.
pub const MAX_UPLOAD_BODY: usize = 64 * 1024 * 1024;

/// Multipart field carrying one file. Repeated.
pub const DOCUMENTS_FIELD: &str = "documents";

/// Multipart field carrying a JSON array of document types, one per file.
pub const DOCUMENT_TYPES_FIELD: &str = "documentTypes";

// -- DTOs ---------------------------------------------------------------------

/// The caller's accreditation status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatusResponse {
    /// True while an APPROVED request has not passed its `expiresAt`.
    pub is_accredited: bool,
    /// Most recently submitted request.
    pub current_verification: Option<Verification>,
    /// All requests, newest first.
    pub verification_history: Vec<Verification>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub id: Uuid,
    pub status: VerificationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub documents: Vec<Document>,
}

// -- Router -------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/verification/status", get(get_status))
        .route("/verification/submit", post(submit))
        .route(
            "/verification/:id/documents",
            post(upload_documents).layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY)),
        )
}

// -- Handlers -----------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/verification/status",
    responses(
        (status = 200, description = "Caller's accreditation status", body = VerificationStatusResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody),
    ),
    tag = "verification"
)]
pub(crate) async fn get_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<VerificationStatusResponse>, AppError> {
    caller.require(Action::ViewOwnStatus, None)?;
    let now = Utc::now();
    let mut history = state.verifications.filter(|v| v.user_id == caller.id());
    history.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

    Ok(Json(VerificationStatusResponse {
        is_accredited: history.iter().any(|v| v.is_accredited(now)),
        current_verification: history.first().cloned(),
        verification_history: history,
    }))
}

#[utoipa::path(
    post,
    path = "/verification/submit",
    request_body = SubmissionFields,
    responses(
        (status = 201, description = "Request opened, wrapped in {success, data}", body = SubmitResponse),
        (status = 200, description = "Request resubmitted, wrapped in {success, data}", body = SubmitResponse),
        (status = 409, description = "A request is already open or the caller is accredited", body = crate::error::ErrorBody),
        (status = 422, description = "Business rule violated", body = crate::error::ErrorBody),
    ),
    tag = "verification"
)]
pub(crate) async fn submit(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<SubmissionFields>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<SubmitResponse>>), AppError> {
    caller.require(Action::SubmitVerification, None)?;
    let submission = extract_json(body)?.validate()?;
    let now = Utc::now();
    let user_id = caller.id();

    let awaiting_resubmission = state.verifications.find(|v| {
        v.user_id == user_id && v.status == VerificationStatus::ResubmissionRequired
    });

    let (before, verification, status_code, action) = match awaiting_resubmission {
        Some(existing) => {
            let (before, updated) = state
                .verifications
                .try_update(&existing.id, |v| {
                    let before = v.clone();
                    v.resubmit(submission, user_id, now).map(|()| (before, v.clone()))
                })
                .ok_or_else(|| AppError::NotFound(format!("verification {} not found", existing.id)))??;
            (Some(before), updated, StatusCode::OK, AuditAction::VerificationResubmitted)
        }
        None => {
            let verification = Verification::submit(user_id, submission, now);
            state
                .verifications
                .insert_if_absent(verification.id, verification.clone(), |v| {
                    v.user_id == user_id && v.blocks_new_submission(now)
                })
                .map_err(|existing| {
                    if existing.is_accredited(now) {
                        AppError::Conflict("You are already an accredited investor".into())
                    } else {
                        AppError::Conflict(format!(
                            "You already have a verification request in status {}",
                            existing.status
                        ))
                    }
                })?;
            (None, verification, StatusCode::CREATED, AuditAction::VerificationSubmitted)
        }
    };

    state.commit_verification(before, &verification).await?;
    state
        .record_audit(NewAuditEvent::new(
            action,
            caller.actor(),
            "verification",
            verification.id,
            serde_json::json!({ "verificationType": verification.verification_type.as_str() }),
        ))
        .await;
    tracing::info!(
        verification_id = %verification.id,
        user_id = %user_id,
        verification_type = %verification.verification_type,
        "verification submitted"
    );

    Ok((
        status_code,
        Json(Envelope::ok(SubmitResponse {
            id: verification.id,
            status: verification.status,
        })),
    ))
}

struct IncomingFile {
    file_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

async fn read_upload(
    mut multipart: Multipart,
) -> Result<(Vec<IncomingFile>, Vec<DocumentType>), AppError> {
    let mut files = Vec::new();
    let mut types: Option<Vec<DocumentType>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(DOCUMENTS_FIELD) => {
                let file_name = field.file_name().unwrap_or("document").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                files.push(IncomingFile {
                    file_name,
                    mime_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some(DOCUMENT_TYPES_FIELD) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                let parsed = serde_json::from_str(&text).map_err(|e| {
                    AppError::BadRequest(format!(
                        "{DOCUMENT_TYPES_FIELD} must be a JSON array of document types: {e}"
                    ))
                })?;
                types = Some(parsed);
            }
            other => {
                tracing::debug!(field = ?other, "ignoring unexpected multipart field");
            }
        }
    }

    Ok((files, types.unwrap_or_default()))
}

#[utoipa::path(
    post,
    path = "/verification/{id}/documents",
    params(("id" = Uuid, Path, description = "Verification ID")),
    request_body(content = String, content_type = "multipart/form-data",
        description = "`documents` file parts and a `documentTypes` JSON array"),
    responses(
        (status = 201, description = "Documents stored, wrapped in {success, data}", body = UploadResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Verification is closed", body = crate::error::ErrorBody),
        (status = 422, description = "File rejected", body = crate::error::ErrorBody),
    ),
    tag = "verification"
)]
pub(crate) async fn upload_documents(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Envelope<UploadResponse>>), AppError> {
    caller.require(Action::SubmitVerification, None)?;
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let verification = state
        .verifications
        .get(&id)
        .filter(|v| v.user_id == caller.id())
        .ok_or_else(|| AppError::NotFound(format!("verification {id} not found")))?;
    if verification.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "documents cannot be added to a verification in status {}",
            verification.status
        )));
    }

    let (files, types) = read_upload(multipart).await?;
    if files.is_empty() {
        return Err(ValidationError::NoDocuments.into());
    }
    if types.len() < files.len() {
        return Err(ValidationError::MissingDocumentType.into());
    }
    if types.len() > files.len() {
        return Err(AppError::BadRequest(format!(
            "{} document types given for {} files",
            types.len(),
            files.len()
        )));
    }
    for file in &files {
        check_upload(&file.file_name, &file.mime_type, file.bytes.len() as u64)?;
    }

    let now = Utc::now();
    let mut documents = Vec::with_capacity(files.len());
    for (file, document_type) in files.into_iter().zip(types) {
        let document = Document {
            id: Uuid::new_v4(),
            document_type,
            file_name: file.file_name,
            file_size: file.bytes.len() as u64,
            mime_type: file.mime_type,
            virus_scan_status: ScanStatus::Pending,
            uploaded_at: now,
        };
        state.blobs.put(&document.storage_key(id), file.bytes).await?;
        documents.push(document);
    }

    let attached = state.verifications.try_update(&id, |v| {
        if v.status.is_terminal() {
            return Err(v.status);
        }
        let before = v.clone();
        for doc in &documents {
            v.attach_document(doc.clone(), now);
        }
        Ok((before, v.clone()))
    });
    let (before, updated) = match attached {
        Some(Ok(pair)) => pair,
        other => {
            for doc in &documents {
                if let Err(e) = state.blobs.delete(&doc.storage_key(id)).await {
                    tracing::warn!(document_id = %doc.id, error = %e, "failed to clean up orphaned blob");
                }
            }
            return Err(match other {
                Some(Err(status)) => AppError::Conflict(format!(
                    "documents cannot be added to a verification in status {status}"
                )),
                _ => AppError::NotFound(format!("verification {id} not found")),
            });
        }
    };

    if let Err(e) = state.commit_verification(Some(before), &updated).await {
        for doc in &documents {
            if let Err(e) = state.blobs.delete(&doc.storage_key(id)).await {
                tracing::warn!(document_id = %doc.id, error = %e, "failed to clean up orphaned blob");
            }
        }
        return Err(e);
    }
    state
        .record_audit(NewAuditEvent::new(
            AuditAction::DocumentUploaded,
            caller.actor(),
            "verification",
            id,
            serde_json::json!({
                "documentIds": documents.iter().map(|d| d.id).collect::<Vec<_>>(),
                "documentTypes": documents.iter().map(|d| d.document_type.as_str()).collect::<Vec<_>>(),
            }),
        ))
        .await;
    tracing::info!(verification_id = %id, count = documents.len(), "documents uploaded");

    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(UploadResponse { documents })),
    ))
}
