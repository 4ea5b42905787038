//! # Admin Review Console
//!
//! | Method | Path                                                | Purpose            |
//! |--------|-----------------------------------------------------|--------------------|
//! | GET    | `/admin/verifications`                              | Filtered page      |
//! | GET    | `/admin/verifications/stats`                        | Counts by status   |
//! | GET    | `/admin/verifications/:id`                          | Detail             |
//! | PUT    | `/admin/verifications/:id/review`                   | Single decision    |
//! | POST   | `/admin/verifications/batch-review`                 | Batch decision     |
//! | GET    | `/admin/verifications/:id/documents/:docId`         | Document bytes     |
//! | PUT    | `/admin/verifications/:id/documents/:docId/scan`    | Scanner callback   |
//!
//! Decisions run under the record's write lock via `Store::try_update`, so
//! two reviewers cannot both decide the same request.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tucson_core::{Action, Document, PageParams, Pagination, ScanStatus, User, VerificationType};
use tucson_state::{ReviewDecision, Verification, VerificationStatus};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEvent, NewAuditEvent};
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, extract_validated_json, Validate};
use crate::routes::{matches_search, Envelope};
use crate::state::AppState;

/// Most ids accepted by one batch review.
pub const MAX_BATCH_SIZE: usize = 100;

// -- DTOs ---------------------------------------------------------------------

/// Query string for the verification list.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListVerificationsQuery {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size, default 10, max 100.
    pub limit: Option<u32>,
    pub status: Option<VerificationStatus>,
    #[serde(rename = "type")]
    pub verification_type: Option<VerificationType>,
    /// Matches owner email, owner name, or verification id.
    pub search: Option<String>,
}

/// Owner contact fields shown next to a verification.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone: user.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationListItem {
    #[serde(flatten)]
    pub verification: Verification,
    pub user: Option<UserSummary>,
}

/// Number of verifications in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: u64,
    pub in_review: u64,
    pub approved: u64,
    pub rejected: u64,
    pub resubmission_required: u64,
    pub expired: u64,
    pub total: u64,
}

impl StatusCounts {
    fn tally<'a>(verifications: impl IntoIterator<Item = &'a Verification>) -> Self {
        let mut counts = Self::default();
        for v in verifications {
            let slot = match v.status {
                VerificationStatus::Pending => &mut counts.pending,
                VerificationStatus::InReview => &mut counts.in_review,
                VerificationStatus::Approved => &mut counts.approved,
                VerificationStatus::Rejected => &mut counts.rejected,
                VerificationStatus::ResubmissionRequired => &mut counts.resubmission_required,
                VerificationStatus::Expired => &mut counts.expired,
            };
            *slot += 1;
            counts.total += 1;
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationListResponse {
    pub data: Vec<VerificationListItem>,
    pub pagination: Pagination,
    /// Counts over all verifications, ignoring filters.
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDetail {
    #[serde(flatten)]
    pub verification: Verification,
    pub user: Option<UserSummary>,
    /// Audit events for this verification, oldest first.
    pub audit_trail: Vec<AuditEvent>,
}

/// Single review request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    /// IN_REVIEW, APPROVED, REJECTED, or RESUBMISSION_REQUIRED.
    pub status: VerificationStatus,
    #[serde(default)]
    pub notes: Option<String>,
    /// Required when `status` is REJECTED.
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// Batch review request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchReviewRequest {
    pub verification_ids: Vec<Uuid>,
    /// APPROVED or REJECTED.
    pub status: VerificationStatus,
    #[serde(default)]
    pub notes: Option<String>,
    /// For REJECTED; falls back to `notes`.
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

impl Validate for BatchReviewRequest {
    fn validate(&self) -> Result<(), String> {
        if self.verification_ids.is_empty() {
            return Err("verificationIds must not be empty".into());
        }
        if self.verification_ids.len() > MAX_BATCH_SIZE {
            return Err(format!(
                "at most {MAX_BATCH_SIZE} verifications may be reviewed at once"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchReviewResponse {
    pub successful: Vec<Uuid>,
    pub failed: Vec<BatchFailure>,
    pub success_count: usize,
    pub failure_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub status: ScanStatus,
}

// -- Router -------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/verifications", get(list_verifications))
        .route("/admin/verifications/stats", get(stats))
        .route("/admin/verifications/batch-review", post(batch_review))
        .route("/admin/verifications/:id", get(get_verification))
        .route("/admin/verifications/:id/review", put(review))
        .route(
            "/admin/verifications/:id/documents/:doc_id",
            get(get_document),
        )
        .route(
            "/admin/verifications/:id/documents/:doc_id/scan",
            put(record_scan),
        )
}

// -- Handlers -----------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/admin/verifications",
    params(ListVerificationsQuery),
    responses(
        (status = 200, description = "One page of verifications", body = VerificationListResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn list_verifications(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<ListVerificationsQuery>, QueryRejection>,
) -> Result<Json<VerificationListResponse>, AppError> {
    caller.require(Action::ReviewVerifications, None)?;
    let query = extract_query(query)?;

    let all = state.verifications.list();
    let counts = StatusCounts::tally(&all);
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut items: Vec<VerificationListItem> = all
        .into_iter()
        .filter(|v| query.status.map_or(true, |s| v.status == s))
        .filter(|v| query.verification_type.map_or(true, |t| v.verification_type == t))
        .map(|v| {
            let user = state.users.get(&v.user_id);
            VerificationListItem {
                user: user.as_ref().map(UserSummary::from),
                verification: v,
            }
        })
        .filter(|item| match search {
            None => true,
            Some(needle) => {
                let id = item.verification.id.to_string();
                match &item.user {
                    Some(u) => {
                        let full_name = format!("{} {}", u.first_name, u.last_name);
                        matches_search(needle, &[u.email.as_str(), full_name.as_str(), id.as_str()])
                    }
                    None => matches_search(needle, &[id.as_str()]),
                }
            }
        })
        .collect();
    items.sort_by(|a, b| b.verification.submitted_at.cmp(&a.verification.submitted_at));

    let (data, pagination) = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .slice(items);

    Ok(Json(VerificationListResponse {
        data,
        pagination,
        counts,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/verifications/stats",
    responses(
        (status = 200, description = "Counts by status", body = StatusCounts),
    ),
    tag = "admin"
)]
pub(crate) async fn stats(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<StatusCounts>, AppError> {
    caller.require(Action::ReviewVerifications, None)?;
    Ok(Json(StatusCounts::tally(&state.verifications.list())))
}

#[utoipa::path(
    get,
    path = "/admin/verifications/{id}",
    params(("id" = Uuid, Path, description = "Verification ID")),
    responses(
        (status = 200, description = "Verification detail", body = VerificationDetail),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn get_verification(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<VerificationDetail>, AppError> {
    caller.require(Action::ReviewVerifications, None)?;
    let verification = state
        .verifications
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("verification {id} not found")))?;
    let user = state.users.get(&verification.user_id);
    Ok(Json(VerificationDetail {
        audit_trail: state.audit.for_resource("verification", &id.to_string()),
        user: user.as_ref().map(UserSummary::from),
        verification,
    }))
}

/// Apply one decision atomically and write it through. Returns the
/// updated record.
async fn apply_decision(
    state: &AppState,
    caller: &CallerIdentity,
    id: Uuid,
    decision: ReviewDecision,
) -> Result<Verification, AppError> {
    let now = Utc::now();
    let (before, updated) = state
        .verifications
        .try_update(&id, |v| {
            let before = v.clone();
            v.review(decision, caller.id(), now).map(|()| (before, v.clone()))
        })
        .ok_or_else(|| AppError::NotFound("Verification not found".into()))??;
    let from = before.status;

    state.commit_verification(Some(before), &updated).await?;
    state
        .record_audit(NewAuditEvent::new(
            AuditAction::VerificationReviewed,
            caller.actor(),
            "verification",
            id,
            serde_json::json!({
                "from": from.as_str(),
                "to": updated.status.as_str(),
                "notes": updated.review_notes,
                "rejectionReason": updated.rejection_reason,
            }),
        ))
        .await;
    tracing::info!(
        verification_id = %id,
        reviewer = %caller.id(),
        from = %from,
        to = %updated.status,
        "verification reviewed"
    );
    Ok(updated)
}

#[utoipa::path(
    put,
    path = "/admin/verifications/{id}/review",
    params(("id" = Uuid, Path, description = "Verification ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Decision recorded, wrapped in {success, data}", body = Verification),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Verification already decided", body = crate::error::ErrorBody),
        (status = 422, description = "Reason or notes missing", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn review(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<Envelope<Verification>>, AppError> {
    caller.require(Action::ReviewVerifications, None)?;
    let req = extract_json(body)?;
    let decision = ReviewDecision::parse(req.status, req.notes, req.rejection_reason)?;
    let updated = apply_decision(&state, &caller, id, decision).await?;
    Ok(Json(Envelope::ok(updated)))
}

#[utoipa::path(
    post,
    path = "/admin/verifications/batch-review",
    request_body = BatchReviewRequest,
    responses(
        (status = 200, description = "Per-id outcomes", body = BatchReviewResponse),
        (status = 422, description = "Invalid batch", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn batch_review(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<BatchReviewRequest>, JsonRejection>,
) -> Result<Json<BatchReviewResponse>, AppError> {
    caller.require(Action::ReviewVerifications, None)?;
    let req = extract_validated_json(body)?;
    let decision = ReviewDecision::parse_batch(req.status, req.notes, req.rejection_reason)?;

    let mut successful = Vec::new();
    let mut failed = Vec::new();
    for id in req.verification_ids {
        match apply_decision(&state, &caller, id, decision.clone()).await {
            Ok(_) => successful.push(id),
            Err(err) => failed.push(BatchFailure {
                id,
                error: err.client_message(),
            }),
        }
    }

    tracing::info!(
        succeeded = successful.len(),
        failed = failed.len(),
        status = %decision.target(),
        "batch review finished"
    );
    Ok(Json(BatchReviewResponse {
        success_count: successful.len(),
        failure_count: failed.len(),
        successful,
        failed,
    }))
}

fn find_document(state: &AppState, id: Uuid, doc_id: Uuid) -> Result<Document, AppError> {
    state
        .verifications
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("verification {id} not found")))?
        .document(doc_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("document {doc_id} not found")))
}

/// Header-safe rendering of an uploaded file name.
fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("inline; filename=\"{safe}\"")
}

#[utoipa::path(
    get,
    path = "/admin/verifications/{id}/documents/{doc_id}",
    params(
        ("id" = Uuid, Path, description = "Verification ID"),
        ("doc_id" = Uuid, Path, description = "Document ID"),
    ),
    responses(
        (status = 200, description = "Document bytes with their MIME type"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Document failed the virus scan", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn get_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, doc_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    caller.require(Action::ReviewVerifications, None)?;
    let document = find_document(&state, id, doc_id)?;
    if document.virus_scan_status == ScanStatus::Infected {
        tracing::warn!(document_id = %doc_id, "refused download of infected document");
        return Err(AppError::Conflict(
            "document failed the virus scan and cannot be downloaded".into(),
        ));
    }
    let bytes = state
        .blobs
        .get(&document.storage_key(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("content of document {doc_id} not found")))?;

    Ok((
        [
            (header::CONTENT_TYPE, document.mime_type.clone()),
            (header::CONTENT_DISPOSITION, content_disposition(&document.file_name)),
        ],
        bytes,
    )
        .into_response())
}

#[utoipa::path(
    put,
    path = "/admin/verifications/{id}/documents/{doc_id}/scan",
    params(
        ("id" = Uuid, Path, description = "Verification ID"),
        ("doc_id" = Uuid, Path, description = "Document ID"),
    ),
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Scan status recorded, wrapped in {success, data}", body = Document),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn record_scan(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, doc_id)): Path<(Uuid, Uuid)>,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<Envelope<Document>>, AppError> {
    caller.require(Action::RecordScanResult, None)?;
    let req = extract_json(body)?;
    let now = Utc::now();

    let (before, updated) = state
        .verifications
        .try_update(&id, |v| {
            let before = v.clone();
            if v.set_scan_status(doc_id, req.status, now) {
                Ok((before, v.clone()))
            } else {
                Err(AppError::NotFound(format!("document {doc_id} not found")))
            }
        })
        .ok_or_else(|| AppError::NotFound(format!("verification {id} not found")))??;

    state.commit_verification(Some(before), &updated).await?;
    state
        .record_audit(NewAuditEvent::new(
            AuditAction::DocumentScanned,
            caller.actor(),
            "verification",
            id,
            serde_json::json!({ "documentId": doc_id, "status": req.status.as_str() }),
        ))
        .await;

    let document = find_document(&state, id, doc_id)?;
    Ok(Json(Envelope::ok(document)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_request_rejects_empty_and_oversized() {
        let mut req = BatchReviewRequest {
            verification_ids: vec![],
            status: VerificationStatus::Approved,
            notes: None,
            rejection_reason: None,
        };
        assert!(req.validate().is_err());
        req.verification_ids = (0..=MAX_BATCH_SIZE).map(|_| Uuid::new_v4()).collect();
        assert!(req.validate().is_err());
        req.verification_ids.truncate(3);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn content_disposition_strips_unsafe_characters() {
        assert_eq!(
            content_disposition("w2 \"2024\".pdf"),
            "inline; filename=\"w2 _2024_.pdf\""
        );
        assert_eq!(content_disposition("résumé.pdf"), "inline; filename=\"r_sum_.pdf\"");
    }

    #[test]
    fn review_request_uses_camel_case() {
        let req: ReviewRequest = serde_json::from_value(serde_json::json!({
            "status": "REJECTED",
            "rejectionReason": "Income not evidenced"
        }))
        .unwrap();
        assert_eq!(req.status, VerificationStatus::Rejected);
        assert_eq!(req.rejection_reason.as_deref(), Some("Income not evidenced"));
    }
}
