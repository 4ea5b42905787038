//! # Application State
//!
//! Users and verifications held in memory, mirrored to Postgres when a pool
//! is configured, and handed to every handler through `State`.
//!
//! ## Architecture
//!
//! - **Users** and **Profiles**: local accounts, linked to the identity
//!   provider by `external_id`.
//! - **Verifications**: accreditation requests with their documents and
//!   transition log.
//! - **Audit log**: hash-chained record of every mutation.
//! - **Blob store**: uploaded document bytes.
//! - **Identity directory**: the identity provider, when configured.
//!
//! The in-memory stores are authoritative for reads. When a database pool
//! is configured every mutation is written through to PostgreSQL and the
//! stores are hydrated from it on startup.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use sqlx::PgPool;
use tucson_core::{Profile, User};
use tucson_identity::IdentityDirectory;
use tucson_state::Verification;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditLog, NewAuditEvent};
use crate::blob::{BlobStore, FsBlobStore, MemoryBlobStore};
use crate::error::AppError;

// -- Store -------------------------------------------------------------------

/// In-memory map behind an `Arc<RwLock>`; clones share the same data.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not
/// `tokio::sync`) because the lock is never held across `.await` points.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or replace; returns the old value.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Insert `value` unless some stored record satisfies `conflicts`.
    ///
    /// The scan and the insert happen under one write lock, so two callers
    /// racing to create the same unique record cannot both succeed. On
    /// conflict the existing record is returned.
    pub fn insert_if_absent(
        &self,
        id: Uuid,
        value: T,
        conflicts: impl Fn(&T) -> bool,
    ) -> Result<(), T> {
        let mut guard = self.data.write();
        if let Some(existing) = guard.values().find(|v| conflicts(v)) {
            return Err(existing.clone());
        }
        guard.insert(id, value);
        Ok(())
    }

    /// Clone of the record for `id`.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// First record matching `pred`.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.data.read().values().find(|v| pred(v)).cloned()
    }

    /// All records matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data
            .read()
            .values()
            .filter(|v| pred(v))
            .cloned()
            .collect()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Apply `f` in place and return the result, `None` if absent.
    pub fn update(&self, id: &Uuid, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut guard = self.data.write();
        if let Some(entry) = guard.get_mut(id) {
            f(entry);
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Read, check and write one record under a single lock.
    ///
    /// The closure may inspect the current state, validate preconditions,
    /// and mutate the record, all under a single write lock. Returns `None`
    /// if the record doesn't exist, or `Some(result)` with the closure's
    /// `Result`.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    /// Remove and return.
    pub fn remove(&self, id: &Uuid) -> Option<T> {
        self.data.write().remove(id)
    }

    /// True if `id` is present.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.data.read().contains_key(id)
    }

    /// Record count.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// No records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Configuration ------------------------------------------------------------

/// Server settings.
///
/// `auth_token` prints as `[REDACTED]`.
#[derive(Clone)]
pub struct AppConfig {
    /// Listen port.
    pub port: u16,
    /// Shared secret for bearer tokens of the form `{externalUserId}:{secret}`.
    /// If `None`, the server runs in development mode and trusts the id.
    pub auth_token: Option<String>,
    /// Directory for uploaded document bytes. In-memory when `None`.
    pub upload_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Read `PORT`, `AUTH_TOKEN`, and `UPLOAD_DIR`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            auth_token: std::env::var("AUTH_TOKEN").ok().filter(|t| !t.is_empty()),
            upload_dir: std::env::var("UPLOAD_DIR")
                .ok()
                .filter(|d| !d.is_empty())
                .map(PathBuf::from),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("upload_dir", &self.upload_dir)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            upload_dir: None,
        }
    }
}

// -- Shared state ------------------------------------------------------------

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub users: Store<User>,
    /// Keyed by owning user id.
    pub profiles: Store<Profile>,
    pub verifications: Store<Verification>,
    pub audit: AuditLog,
    pub blobs: Arc<dyn BlobStore>,
    /// Identity provider, absent when `CLERK_SECRET_KEY` is unset.
    pub identity: Option<Arc<dyn IdentityDirectory>>,
    /// PostgreSQL pool for write-through persistence. In-memory only when `None`.
    pub db_pool: Option<PgPool>,
    pub config: AppConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("users", &self.users.len())
            .field("profiles", &self.profiles.len())
            .field("verifications", &self.verifications.len())
            .field("audit_events", &self.audit.len())
            .field("blobs", &self.blobs)
            .field("identity", &self.identity.is_some())
            .field("db_pool", &self.db_pool.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl AppState {
    /// Create a new application state with default configuration,
    /// no identity provider, and no database.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None, None)
    }

    /// Create a new application state with the given configuration,
    /// optional identity provider, and optional database pool.
    pub fn with_config(
        config: AppConfig,
        identity: Option<Arc<dyn IdentityDirectory>>,
        db_pool: Option<PgPool>,
    ) -> Self {
        let blobs: Arc<dyn BlobStore> = match &config.upload_dir {
            Some(dir) => Arc::new(FsBlobStore::new(dir.clone())),
            None => Arc::new(MemoryBlobStore::new()),
        };
        Self {
            users: Store::new(),
            profiles: Store::new(),
            verifications: Store::new(),
            audit: AuditLog::new(),
            blobs,
            identity,
            db_pool,
            config,
        }
    }

    /// Replace the blob store.
    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = blobs;
        self
    }

    /// Local account linked to the given identity-provider id.
    pub fn user_by_external_id(&self, external_id: &str) -> Option<User> {
        self.users
            .find(|u| u.external_id.as_deref() == Some(external_id))
    }

    /// Local account with the given email, compared case-insensitively.
    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.users.find(|u| u.has_email(email))
    }

    /// Account linked to `external_id`, reading through to the database when
    /// memory has none. Accounts written by the `tucson` CLI while the
    /// server is running are found here and cached.
    pub async fn find_user_by_external_id(&self, external_id: &str) -> Result<Option<User>, AppError> {
        if let Some(user) = self.user_by_external_id(external_id) {
            return Ok(Some(user));
        }
        let Some(pool) = &self.db_pool else {
            return Ok(None);
        };
        match crate::db::users::find_by_external_id(pool, external_id).await {
            Ok(Some(user)) => {
                tracing::info!(user_id = %user.id, external_id, "loaded account written outside this process");
                self.users.insert(user.id, user.clone());
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::error!(external_id, error = %e, "failed to look up account");
                Err(AppError::Internal("failed to look up account".into()))
            }
        }
    }

    // -- Write-through persistence ------------------------------------------

    /// Persist a user. Fails with `Internal` when the database write fails.
    pub async fn persist_user(&self, user: &User) -> Result<(), AppError> {
        if let Some(pool) = &self.db_pool {
            if let Err(e) = crate::db::users::upsert(pool, user).await {
                tracing::error!(user_id = %user.id, error = %e, "failed to persist user");
                return Err(AppError::Internal(
                    "user recorded in-memory but database persist failed".into(),
                ));
            }
        }
        Ok(())
    }

    /// Persist a profile.
    pub async fn persist_profile(&self, profile: &Profile) -> Result<(), AppError> {
        if let Some(pool) = &self.db_pool {
            if let Err(e) = crate::db::users::upsert_profile(pool, profile).await {
                tracing::error!(user_id = %profile.user_id, error = %e, "failed to persist profile");
                return Err(AppError::Internal(
                    "profile recorded in-memory but database persist failed".into(),
                ));
            }
        }
        Ok(())
    }

    /// Persist a verification and its documents.
    ///
    /// When the stored row has meanwhile become terminal (another process
    /// expired or decided it), nothing is written, the stored copy replaces
    /// the in-memory one, and the caller gets 409.
    pub async fn persist_verification(&self, verification: &Verification) -> Result<(), AppError> {
        let Some(pool) = &self.db_pool else {
            return Ok(());
        };
        match crate::db::verifications::upsert(pool, verification).await {
            Ok(true) => Ok(()),
            Ok(false) => match crate::db::verifications::load_one(pool, verification.id).await {
                Ok(Some(stored)) => Err(self.adopt_stored_verification(stored)),
                Ok(None) => Err(AppError::Conflict(format!(
                    "verification {} changed while it was being updated",
                    verification.id
                ))),
                Err(e) => {
                    tracing::error!(verification_id = %verification.id, error = %e, "failed to reload verification");
                    Err(AppError::Internal("failed to reload verification".into()))
                }
            },
            Err(e) => {
                tracing::error!(
                    verification_id = %verification.id,
                    error = %e,
                    "failed to persist verification"
                );
                Err(AppError::Internal(
                    "verification recorded in-memory but database persist failed".into(),
                ))
            }
        }
    }

    /// Replace the in-memory copy with the stored one and report the
    /// conflict.
    pub(crate) fn adopt_stored_verification(&self, stored: Verification) -> AppError {
        tracing::warn!(
            verification_id = %stored.id,
            status = %stored.status,
            "in-memory verification was stale, adopted stored copy"
        );
        let err = AppError::Conflict(format!(
            "verification {} is already {}",
            stored.id, stored.status
        ));
        self.verifications.insert(stored.id, stored);
        err
    }

    /// [`Self::persist_verification`], undoing the in-memory change when
    /// the write fails. `before` is the record as it was before `updated`
    /// was applied; it is put back only if nothing else has changed the
    /// record since.
    pub async fn commit_verification(
        &self,
        before: Option<Verification>,
        updated: &Verification,
    ) -> Result<(), AppError> {
        let Err(err) = self.persist_verification(updated).await else {
            return Ok(());
        };
        if matches!(err, AppError::Conflict(_)) {
            return Err(err);
        }
        let mut rolled_back = false;
        match before {
            Some(before) => {
                self.verifications.update(&updated.id, |current| {
                    if *current == *updated {
                        *current = before;
                        rolled_back = true;
                    }
                });
            }
            None => {
                if self.verifications.get(&updated.id).as_ref() == Some(updated) {
                    self.verifications.remove(&updated.id);
                    rolled_back = true;
                }
            }
        }
        if rolled_back {
            tracing::warn!(verification_id = %updated.id, "rolled back in-memory change after failed persist");
        }
        Err(err)
    }

    /// Delete a user row. Profile, verifications, and documents cascade.
    pub async fn delete_user_row(&self, user_id: Uuid) -> Result<(), AppError> {
        if let Some(pool) = &self.db_pool {
            if let Err(e) = crate::db::users::delete(pool, user_id).await {
                tracing::error!(user_id = %user_id, error = %e, "failed to delete user row");
                return Err(AppError::Internal(
                    "user removed in-memory but database delete failed".into(),
                ));
            }
        }
        Ok(())
    }

    /// Append an audit event and write it through.
    ///
    /// With a database, events stored by another process since our head
    /// are pulled in first so the new event chains after them. A failed
    /// database write is logged; the in-memory chain keeps the event.
    pub async fn record_audit(&self, event: NewAuditEvent) -> AuditEvent {
        if let Some(pool) = &self.db_pool {
            match crate::db::audit::load_from(pool, self.audit.len() as i64).await {
                Ok(newer) if !newer.is_empty() => {
                    let added = self.audit.catch_up(newer);
                    tracing::info!(added, "caught up audit events written by another process");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read audit head, appending to in-memory chain");
                }
            }
        }
        let recorded = self.audit.append(event);
        if let Some(pool) = &self.db_pool {
            if let Err(e) = crate::db::audit::insert(pool, &recorded).await {
                tracing::error!(
                    audit_id = %recorded.id,
                    action = %recorded.action,
                    error = %e,
                    "failed to persist audit event"
                );
            }
        }
        recorded
    }

    /// Load every user and verification row into memory.
    ///
    /// Called once on startup when a database pool is available.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let users = crate::db::users::load_all(pool)
            .await
            .map_err(|e| format!("failed to load users: {e}"))?;
        let user_count = users.len();
        for user in users {
            self.users.insert(user.id, user);
        }

        let profiles = crate::db::users::load_all_profiles(pool)
            .await
            .map_err(|e| format!("failed to load profiles: {e}"))?;
        let profile_count = profiles.len();
        for profile in profiles {
            self.profiles.insert(profile.user_id, profile);
        }

        let verifications = crate::db::verifications::load_all(pool)
            .await
            .map_err(|e| format!("failed to load verifications: {e}"))?;
        let verification_count = verifications.len();
        for verification in verifications {
            self.verifications.insert(verification.id, verification);
        }

        let events = crate::db::audit::load_all(pool)
            .await
            .map_err(|e| format!("failed to load audit events: {e}"))?;
        let audit_count = events.len();
        self.audit.restore(events);

        let integrity = self.audit.verify();
        if !integrity.chain_valid {
            tracing::warn!(
                broken_links = integrity.broken_links,
                total_events = integrity.total_events,
                "audit chain integrity check failed"
            );
        }

        tracing::info!(
            users = user_count,
            profiles = profile_count,
            verifications = verification_count,
            audit_events = audit_count,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
