//! Typed client for the provider's user endpoints.
//!
//! - `GET /v1/users?limit={n}&offset={m}`
//! - `GET /v1/users/{id}`

use serde::{Deserialize, Serialize};
use tucson_core::Role;

use crate::error::IdentityApiError;

// -- Types matching the provider's schemas ------------------------------------

/// An email address attached to a provider user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEmailAddress {
    /// Address identifier, referenced by `primary_email_address_id`.
    pub id: String,
    /// The address itself.
    pub email_address: String,
}

/// A phone number attached to a provider user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPhoneNumber {
    /// Number identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// The number, E.164 formatted.
    pub phone_number: String,
}

/// A user record as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUser {
    /// Provider user id (`user_...`).
    pub id: String,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// All email addresses.
    #[serde(default)]
    pub email_addresses: Vec<ProviderEmailAddress>,
    /// Which of `email_addresses` is primary.
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    /// All phone numbers.
    #[serde(default)]
    pub phone_numbers: Vec<ProviderPhoneNumber>,
    /// Application-defined metadata visible to the frontend.
    #[serde(default)]
    pub public_metadata: serde_json::Value,
    /// Creation time, milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl ProviderUser {
    /// The primary email address, else the first one, else `None`.
    pub fn primary_email(&self) -> Option<&str> {
        let primary = self.primary_email_address_id.as_deref().and_then(|pid| {
            self.email_addresses
                .iter()
                .find(|e| e.id == pid)
        });
        primary
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email_address.trim())
            .filter(|e| !e.is_empty())
    }

    /// The first phone number, if any.
    pub fn first_phone(&self) -> Option<&str> {
        self.phone_numbers.first().map(|p| p.phone_number.as_str())
    }

    /// `public_metadata.role` when it names a valid role.
    pub fn metadata_role(&self) -> Option<Role> {
        self.public_metadata
            .get("role")
            .and_then(|v| v.as_str())
            .and_then(|s| s.trim().to_ascii_uppercase().parse().ok())
    }
}

/// The list endpoint answers either a bare array or a paginated envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserListResponse {
    Bare(Vec<ProviderUser>),
    Paginated { data: Vec<ProviderUser> },
}

// -- Client -------------------------------------------------------------------

/// Client for the provider's user endpoints.
#[derive(Debug, Clone)]
pub struct UsersClient {
    http: reqwest::Client,
    base_url: String,
}

impl UsersClient {
    pub(crate) fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }

    /// List users.
    ///
    /// Calls `GET {base_url}/v1/users?limit={limit}&offset={offset}`.
    pub async fn list(&self, limit: u32, offset: u32) -> Result<Vec<ProviderUser>, IdentityApiError> {
        let endpoint = "GET /v1/users";
        let url = format!("{}/v1/users", self.base_url);

        let resp = self
            .http
            .get(&url)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await
            .map_err(|e| IdentityApiError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityApiError::ApiError {
                endpoint: endpoint.into(),
                status,
                body,
            });
        }

        let list: UserListResponse =
            resp.json()
                .await
                .map_err(|e| IdentityApiError::Deserialization {
                    endpoint: endpoint.into(),
                    source: e,
                })?;
        let users = match list {
            UserListResponse::Bare(users) | UserListResponse::Paginated { data: users } => users,
        };
        tracing::debug!(count = users.len(), limit, offset, "fetched identity provider users");
        Ok(users)
    }

    /// Fetch one user, `None` if the provider does not know the id.
    ///
    /// Calls `GET {base_url}/v1/users/{id}`.
    pub async fn get(&self, id: &str) -> Result<Option<ProviderUser>, IdentityApiError> {
        let endpoint = format!("GET /v1/users/{id}");
        let url = format!("{}/v1/users/{id}", self.base_url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| IdentityApiError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityApiError::ApiError {
                endpoint,
                status,
                body,
            });
        }

        resp.json()
            .await
            .map(Some)
            .map_err(|e| IdentityApiError::Deserialization {
                endpoint,
                source: e,
            })
    }
}
