//! Submitting a completed verification wizard.
//!
//! The wizard is validated locally first, so an incomplete or
//! below-threshold form never reaches the network. A valid form is sent as
//! one `POST /verification/submit` followed, when files are attached, by
//! one multipart upload tagged with the returned id.
//!
//! When the submit succeeds but the upload fails, the request already
//! exists on the server and a second submit would be refused. The error
//! then carries the created id, and [`retry_upload`] sends only the files.

use thiserror::Error;
use tucson_core::DocumentType;
use tucson_state::{FileAttachment, VerificationWizard};
use uuid::Uuid;

use crate::client::TucsonClient;
use crate::error::ClientError;

/// Shown when a submit failure carries no server message.
pub const SUBMIT_FALLBACK: &str = "Failed to submit verification. Please try again.";

/// Shown when the request was created but its documents did not arrive.
pub const UPLOAD_FALLBACK: &str =
    "Your request was saved but the documents failed to upload. Please try again.";

/// A successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submitted {
    pub verification_id: Uuid,
}

/// A failed submission, with the text to show on the review step.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SubmitError {
    pub message: String,
    /// Set when the request was created and only the upload failed.
    pub verification_id: Option<Uuid>,
    #[source]
    pub source: ClientError,
}

impl From<ClientError> for SubmitError {
    fn from(source: ClientError) -> Self {
        Self {
            message: source.user_message_or(SUBMIT_FALLBACK),
            verification_id: None,
            source,
        }
    }
}

impl SubmitError {
    fn upload_failed(verification_id: Uuid, source: ClientError) -> Self {
        Self {
            message: source.user_message_or(UPLOAD_FALLBACK),
            verification_id: Some(verification_id),
            source,
        }
    }

    /// Whether the failure happened before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(self.source, ClientError::Validation(_))
    }
}

/// Submit `wizard` and upload its documents.
///
/// The wizard is borrowed immutably; on failure it still holds everything
/// the user entered, so they can correct and retry from the last step. If
/// the error carries a `verification_id`, retry with [`retry_upload`]
/// instead of calling this again.
pub async fn submit(client: &TucsonClient, wizard: &VerificationWizard) -> Result<Submitted, SubmitError> {
    let plan = wizard.prepare_submission().map_err(ClientError::from)?;

    let created = client
        .submit_verification(&plan.submission.to_fields())
        .await?;
    tracing::info!(verification_id = %created.id, status = %created.status, "verification submitted");

    if !plan.documents.is_empty() {
        upload(client, created.id, &plan.documents).await?;
    }

    Ok(Submitted {
        verification_id: created.id,
    })
}

/// Upload the wizard's documents to a request created by an earlier
/// [`submit`] whose upload failed. Sends no submit request.
pub async fn retry_upload(
    client: &TucsonClient,
    verification_id: Uuid,
    wizard: &VerificationWizard,
) -> Result<Submitted, SubmitError> {
    let plan = wizard.prepare_submission().map_err(ClientError::from)?;
    upload(client, verification_id, &plan.documents).await?;
    Ok(Submitted { verification_id })
}

async fn upload(
    client: &TucsonClient,
    verification_id: Uuid,
    documents: &[(FileAttachment, DocumentType)],
) -> Result<(), SubmitError> {
    match client.upload_documents(verification_id, documents).await {
        Ok(uploaded) => {
            tracing::info!(%verification_id, count = uploaded.len(), "documents uploaded");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(%verification_id, error = %e, "document upload failed after submit");
            Err(SubmitError::upload_failed(verification_id, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tucson_core::ValidationError;

    #[test]
    fn server_message_wins_over_fallback() {
        let err = SubmitError::from(crate::error::api_error(
            "POST /verification/submit".into(),
            409,
            r#"{"error":{"code":"CONFLICT","message":"You already have a pending verification request"}}"#,
        ));
        assert_eq!(err.message, "You already have a pending verification request");
        assert!(!err.is_local());
    }

    #[test]
    fn bare_failure_uses_submit_fallback() {
        let err = SubmitError::from(crate::error::api_error(
            "POST /verification/submit".into(),
            500,
            "",
        ));
        assert_eq!(err.message, SUBMIT_FALLBACK);
    }

    #[test]
    fn local_validation_is_flagged() {
        let err = SubmitError::from(ClientError::from(ValidationError::NoDocuments));
        assert!(err.is_local());
        assert_eq!(err.message, "Please upload at least one supporting document");
        assert_eq!(err.verification_id, None);
    }

    #[test]
    fn upload_failure_keeps_the_created_id() {
        let id = Uuid::new_v4();
        let err = SubmitError::upload_failed(
            id,
            crate::error::api_error(format!("POST /verification/{id}/documents"), 502, ""),
        );
        assert_eq!(err.verification_id, Some(id));
        assert_eq!(err.message, UPLOAD_FALLBACK);
    }
}
