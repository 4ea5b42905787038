//! # tucson-identity -- Typed client for the identity provider
//!
//! Authentication is delegated to a third-party identity provider whose
//! Backend API is Clerk compatible. This crate covers the three calls the
//! platform makes to it:
//!
//! - **Users**: `GET /v1/users?limit&offset`, `GET /v1/users/{id}`
//! - **Invitations**: `POST /v1/invitations`
//!
//! ## Seam
//!
//! Callers depend on [`IdentityDirectory`] rather than on [`IdentityClient`]
//! so the sync job and the invite handler can run against an in-memory
//! directory in tests.
//!
//! Requests are not retried; a failure surfaces to the caller.

pub mod config;
pub mod error;
pub mod invitations;
pub mod users;

pub use config::IdentityApiConfig;
pub use error::IdentityApiError;
pub use invitations::{Invitation, InvitationRequest};
pub use users::{ProviderEmailAddress, ProviderPhoneNumber, ProviderUser};

use std::time::Duration;

use async_trait::async_trait;

/// Read and invite access to the identity provider's user directory.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// List users, `limit` at a time starting at `offset`.
    async fn list_users(&self, limit: u32, offset: u32) -> Result<Vec<ProviderUser>, IdentityApiError>;

    /// Fetch one user by provider id.
    async fn get_user(&self, id: &str) -> Result<Option<ProviderUser>, IdentityApiError>;

    /// Send an invitation.
    async fn create_invitation(&self, req: &InvitationRequest) -> Result<Invitation, IdentityApiError>;
}

/// Top-level identity provider client. Holds a sub-client per resource.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    users: users::UsersClient,
    invitations: invitations::InvitationsClient,
}

impl IdentityClient {
    /// Create a new client from configuration.
    pub fn new(config: IdentityApiConfig) -> Result<Self, IdentityApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                let mut value = reqwest::header::HeaderValue::from_str(&format!(
                    "Bearer {}",
                    config.secret_key.as_str()
                ))
                .map_err(|_| IdentityApiError::Config(config::ConfigError::MissingSecretKey))?;
                value.set_sensitive(true);
                headers.insert(reqwest::header::AUTHORIZATION, value);
                headers
            })
            .build()
            .map_err(|e| IdentityApiError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        let base_url = config.api_url.as_str().trim_end_matches('/').to_string();

        Ok(Self {
            users: users::UsersClient::new(http.clone(), base_url.clone()),
            invitations: invitations::InvitationsClient::new(http, base_url),
        })
    }

    /// Access the users client.
    pub fn users(&self) -> &users::UsersClient {
        &self.users
    }

    /// Access the invitations client.
    pub fn invitations(&self) -> &invitations::InvitationsClient {
        &self.invitations
    }
}

#[async_trait]
impl IdentityDirectory for IdentityClient {
    async fn list_users(&self, limit: u32, offset: u32) -> Result<Vec<ProviderUser>, IdentityApiError> {
        self.users.list(limit, offset).await
    }

    async fn get_user(&self, id: &str) -> Result<Option<ProviderUser>, IdentityApiError> {
        self.users.get(id).await
    }

    async fn create_invitation(&self, req: &InvitationRequest) -> Result<Invitation, IdentityApiError> {
        self.invitations.create(req).await
    }
}
