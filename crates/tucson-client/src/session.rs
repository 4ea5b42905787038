//! # Session
//!
//! The identity provider issues the credentials; the client only needs a
//! bearer token per request. [`TokenProvider`] is that seam. [`Session`]
//! ties a provider to the profile cache so that signing out clears the
//! cached profile before anything else can read it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use zeroize::Zeroizing;

use crate::client::TucsonClient;
use crate::types::ProfileView;
use crate::error::ClientError;
use crate::profile_cache::ProfileCache;

/// Source of bearer tokens and signed-in state.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Token for the next request, `None` when signed out.
    async fn token(&self) -> Result<Option<String>, ClientError>;

    /// Identity-provider id of the signed-in user.
    fn current_user_id(&self) -> Option<String>;

    fn is_signed_in(&self) -> bool {
        self.current_user_id().is_some()
    }

    /// Forget the credentials.
    fn sign_out(&self);
}

/// A fixed `{externalUserId}:{secret}` credential, for services, scripts,
/// and tests.
pub struct StaticToken {
    inner: RwLock<Option<(String, Zeroizing<String>)>>,
}

impl StaticToken {
    pub fn new(external_user_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(Some((external_user_id.into(), Zeroizing::new(secret.into())))),
        }
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToken")
            .field("user", &self.current_user_id())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<Option<String>, ClientError> {
        Ok(self
            .inner
            .read()
            .as_ref()
            .map(|(id, secret)| format!("{id}:{}", secret.as_str())))
    }

    fn current_user_id(&self) -> Option<String> {
        self.inner.read().as_ref().map(|(id, _)| id.clone())
    }

    fn sign_out(&self) {
        *self.inner.write() = None;
    }
}

/// A signed-in user's view of the API.
pub struct Session {
    client: TucsonClient,
    tokens: Arc<dyn TokenProvider>,
    profile: ProfileCache,
}

impl Session {
    /// Start a session against `base_url`.
    pub fn new(base_url: &str, tokens: Arc<dyn TokenProvider>) -> Result<Self, ClientError> {
        Ok(Self {
            client: TucsonClient::new(base_url, tokens.clone())?,
            tokens,
            profile: ProfileCache::new(),
        })
    }

    /// Use a custom profile cache.
    pub fn with_profile_cache(mut self, cache: ProfileCache) -> Self {
        self.profile = cache;
        self
    }

    pub fn client(&self) -> &TucsonClient {
        &self.client
    }

    pub fn is_signed_in(&self) -> bool {
        self.tokens.is_signed_in()
    }

    /// The signed-in user's account and profile, served from the cache
    /// when fresh. Concurrent callers share one request.
    pub async fn profile(&self) -> Result<Arc<ProfileView>, ClientError> {
        let user_id = self.tokens.current_user_id().ok_or(ClientError::NotSignedIn)?;
        self.profile
            .get_or_fetch(&user_id, self.client.get_profile())
            .await
    }

    /// Drop the cached profile, e.g. after an edit.
    pub fn refresh_profile(&self) {
        self.profile.clear();
    }

    /// Clear the cache, then the credentials.
    pub fn sign_out(&self) {
        self.profile.clear();
        self.tokens.sign_out();
        tracing::debug!("signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_formats_and_signs_out() {
        let token = StaticToken::new("user_1", "s3cret");
        assert_eq!(token.token().await.unwrap().as_deref(), Some("user_1:s3cret"));
        assert!(token.is_signed_in());
        token.sign_out();
        assert_eq!(token.token().await.unwrap(), None);
        assert!(!token.is_signed_in());
    }

    #[test]
    fn debug_redacts_secret() {
        let token = StaticToken::new("user_1", "s3cret");
        let debug = format!("{token:?}");
        assert!(!debug.contains("s3cret"));
    }
}
