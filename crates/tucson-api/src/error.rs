//! # Errors
//!
//! [`AppError`] is what every handler returns. Domain errors from the
//! core, state and identity crates convert into it, and it renders as a
//! status code plus a JSON body of the form
//! `{"error": {"code", "message", "details"?}}`.
//!
//! Client-facing messages carry the domain error text verbatim, so a
//! wizard rule rejected by the server reads the same as when the wizard
//! rejects it locally. Internal error details are never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// `{"error": {...}}` as sent on every failure.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Stable code such as `NOT_FOUND`.
    pub code: String,
    /// Text safe to show a user.
    pub message: String,
    /// Extra structured context, 4xx only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Handler error, rendered as [`ErrorBody`].
#[derive(Error, Debug)]
pub enum AppError {
    /// 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// A business rule rejected the request (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not permitted (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The record's current state forbids the change (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The identity provider failed or refused the call (502).
    #[error("upstream error: {0}")]
    Upstream(String),

    /// A dependency the endpoint needs is not configured (503).
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// 500. Logged, never echoed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status and stable code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// The message placed in the response body.
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::NotFound(m)
            | Self::Validation(m)
            | Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::Conflict(m)
            | Self::Upstream(m)
            | Self::Unavailable(m) => m.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Upstream(_) => tracing::warn!(error = %self, "identity provider call failed"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.client_message(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<tucson_core::ValidationError> for AppError {
    fn from(err: tucson_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<tucson_core::DenyReason> for AppError {
    fn from(reason: tucson_core::DenyReason) -> Self {
        Self::Forbidden(reason.to_string())
    }
}

impl From<tucson_state::TransitionError> for AppError {
    fn from(err: tucson_state::TransitionError) -> Self {
        use tucson_state::TransitionError as T;
        match &err {
            T::Terminal { .. } | T::InvalidTransition { .. } => Self::Conflict(err.to_string()),
            T::MissingRejectionReason | T::MissingResubmissionNotes | T::UnsupportedTarget(_) => {
                Self::Validation(err.to_string())
            }
        }
    }
}

impl From<tucson_identity::IdentityApiError> for AppError {
    fn from(err: tucson_identity::IdentityApiError) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<crate::blob::BlobError> for AppError {
    fn from(err: crate::blob::BlobError) -> Self {
        Self::Internal(format!("document storage: {err}"))
    }
}
