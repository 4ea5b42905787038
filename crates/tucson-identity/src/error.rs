//! Identity provider client error types.

/// Errors from identity provider calls.
#[derive(Debug, thiserror::Error)]
pub enum IdentityApiError {
    /// HTTP transport error (connection refused, timeout, TLS).
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        /// Method and path that failed.
        endpoint: String,
        /// Underlying transport error.
        source: reqwest::Error,
    },
    /// The provider returned a non-2xx status.
    #[error("identity provider {endpoint} returned {status}: {body}")]
    ApiError {
        /// Method and path that failed.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        /// Method and path that failed.
        endpoint: String,
        /// Underlying decode error.
        source: reqwest::Error,
    },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}
