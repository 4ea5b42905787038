//! Identity provider client configuration.
//!
//! The base URL defaults to the hosted Clerk Backend API. Override via
//! environment variables or explicit construction for staging/testing.

use url::Url;
use zeroize::Zeroizing;

/// Default Backend API base URL.
pub const DEFAULT_API_URL: &str = "https://api.clerk.com";

/// Configuration for connecting to the identity provider.
///
/// Custom `Debug` implementation redacts the `secret_key` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct IdentityApiConfig {
    /// Base URL of the Backend API.
    pub api_url: Url,
    /// Backend secret key, sent as a bearer token. Zeroed on drop.
    pub secret_key: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for IdentityApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityApiConfig")
            .field("api_url", &self.api_url)
            .field("secret_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl IdentityApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `CLERK_SECRET_KEY` (required)
    /// - `CLERK_API_URL` (default: `https://api.clerk.com`)
    /// - `CLERK_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret_key = std::env::var("CLERK_SECRET_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecretKey)?;

        Ok(Self {
            api_url: env_url("CLERK_API_URL", DEFAULT_API_URL)?,
            secret_key: Zeroizing::new(secret_key),
            timeout_secs: std::env::var("CLERK_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        })
    }

    /// Create a configuration pointing at an explicit base URL.
    pub fn new(api_url: &str, secret_key: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: Url::parse(api_url)
                .map_err(|e| ConfigError::InvalidUrl(api_url.to_string(), e.to_string()))?,
            secret_key: Zeroizing::new(secret_key.to_string()),
            timeout_secs: 30,
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `CLERK_SECRET_KEY` is unset or empty.
    #[error("CLERK_SECRET_KEY environment variable is required")]
    MissingSecretKey,
    /// A URL variable does not parse.
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let config = IdentityApiConfig::new("http://127.0.0.1:9", "sk_test_very_secret").unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk_test_very_secret"));
    }

    #[test]
    fn invalid_url_is_reported() {
        let err = IdentityApiConfig::new("not a url", "sk").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_, _)));
    }
}
