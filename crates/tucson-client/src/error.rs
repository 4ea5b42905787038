//! Client error types.
//!
//! Every failure the client can produce is a [`ClientError`]. Nothing in
//! this crate panics on a bad response; callers show
//! [`ClientError::user_message`] to the user.

use std::sync::Arc;

use serde::Deserialize;
use tucson_core::{DenyReason, ValidationError};
use tucson_state::TransitionError;

/// Shown when a failure carries no server message.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Errors from client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Input failed a business rule. No request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A review decision is incomplete. No request was sent.
    #[error(transparent)]
    Review(#[from] TransitionError),

    /// The signed-in user may not perform the action. No request was sent.
    #[error(transparent)]
    Forbidden(#[from] DenyReason),

    /// The user declined a confirmation prompt.
    #[error("action cancelled")]
    Cancelled,

    /// No session token is available.
    #[error("not signed in")]
    NotSignedIn,

    /// HTTP transport error (connection refused, timeout, TLS).
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The API returned a non-2xx status.
    #[error("{endpoint} returned {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        /// Machine-readable code from the error body, when present.
        code: Option<String>,
        /// Server message, empty when the body was not an error envelope.
        message: String,
    },

    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The base URL does not parse.
    #[error("invalid API base URL \"{0}\"")]
    InvalidUrl(String),

    /// The same failure observed by several waiters on one cached fetch.
    #[error(transparent)]
    Shared(Arc<ClientError>),
}

impl ClientError {
    /// The server's own message for an API error, if it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } if !message.is_empty() => Some(message),
            Self::Shared(inner) => inner.server_message(),
            _ => None,
        }
    }

    /// HTTP status for API errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Shared(inner) => inner.status(),
            _ => None,
        }
    }

    /// Text suitable for showing to the user.
    ///
    /// Local rule violations show their own message, API errors show the
    /// server message, and everything else falls back to `fallback`.
    pub fn user_message_or(&self, fallback: &str) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Review(e) => e.to_string(),
            Self::Forbidden(e) => e.to_string(),
            Self::Cancelled => "Action cancelled.".to_string(),
            Self::NotSignedIn => "Please sign in to continue.".to_string(),
            Self::Shared(inner) => inner.user_message_or(fallback),
            other => other
                .server_message()
                .map(String::from)
                .unwrap_or_else(|| fallback.to_string()),
        }
    }

    /// [`Self::user_message_or`] with the generic fallback.
    pub fn user_message(&self) -> String {
        self.user_message_or(GENERIC_FAILURE)
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: Option<String>,
    #[serde(default)]
    message: String,
}

/// Build an [`ClientError::Api`] from a failed response body.
pub(crate) fn api_error(endpoint: String, status: u16, body: &str) -> ClientError {
    let (code, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.code, envelope.error.message),
        Err(_) => (None, String::new()),
    };
    ClientError::Api {
        endpoint,
        status,
        code,
        message,
    }
}
