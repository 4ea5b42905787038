//! Typed client for `POST /v1/invitations`.

use serde::{Deserialize, Serialize};

use crate::error::IdentityApiError;

/// Invitation request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationRequest {
    /// Address to invite.
    pub email_address: String,
    /// Metadata copied onto the user when the invitation is accepted.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub public_metadata: serde_json::Value,
    /// Where the sign-up link lands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// An invitation as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    /// Invitation id (`inv_...`).
    pub id: String,
    /// Invited address.
    pub email_address: String,
    /// `pending`, `accepted`, or `revoked`.
    #[serde(default)]
    pub status: Option<String>,
}

/// Client for the provider's invitation endpoint.
#[derive(Debug, Clone)]
pub struct InvitationsClient {
    http: reqwest::Client,
    base_url: String,
}

impl InvitationsClient {
    pub(crate) fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }

    /// Send an invitation email.
    ///
    /// Calls `POST {base_url}/v1/invitations`.
    pub async fn create(&self, req: &InvitationRequest) -> Result<Invitation, IdentityApiError> {
        let endpoint = "POST /v1/invitations";
        let url = format!("{}/v1/invitations", self.base_url);

        let resp = self
            .http
            .post(&url)
            .json(req)
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

        resp.json().await.map_err(|e| IdentityApiError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })
    }
}
