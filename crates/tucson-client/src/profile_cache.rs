//! Short-lived cache of the signed-in user's profile.
//!
//! Many views read the profile at once right after sign-in. The cache keeps
//! one copy for [`PROFILE_TTL`], and concurrent misses for the same user
//! wait on a single fetch instead of each issuing a request. Each
//! [`Session`](crate::session::Session) owns its own cache.
//!
//! Entries are keyed by an epoch that [`ProfileCache::clear`] bumps. A
//! fetch still in flight when the cache is cleared lands under the old
//! epoch, where no later read looks.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::types::ProfileView;
use crate::error::ClientError;

/// How long a fetched profile stays fresh.
pub const PROFILE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ProfileCache {
    inner: Cache<(u64, String), Arc<ProfileView>>,
    epoch: Arc<AtomicU64>,
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::with_ttl(PROFILE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(16).time_to_live(ttl).build(),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return the cached profile for `user_id`, or run `fetch` to load it.
    ///
    /// Callers that arrive while a fetch is in flight await that fetch. A
    /// failed fetch is not cached.
    pub async fn get_or_fetch<F>(&self, user_id: &str, fetch: F) -> Result<Arc<ProfileView>, ClientError>
    where
        F: Future<Output = Result<ProfileView, ClientError>>,
    {
        let key = (self.epoch.load(Ordering::Acquire), user_id.to_string());
        self.inner
            .try_get_with(key, async move { fetch.await.map(Arc::new) })
            .await
            .map_err(ClientError::Shared)
    }

    /// Drop every entry. Subsequent reads miss immediately, including
    /// while an earlier fetch is still running.
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.inner.invalidate_all();
    }
}
