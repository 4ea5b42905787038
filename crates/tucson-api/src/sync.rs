//! # Identity-Provider User Sync
//!
//! One pass that pulls users from the identity provider and creates the
//! local accounts that are missing. Used by `POST /admin/users/sync-clerk`
//! and by the `tucson sync-users` command.
//!
//! 1. Fetch up to [`SYNC_FETCH_LIMIT`] provider users. A failure here
//!    aborts the run.
//! 2. A provider user already exists locally when a local account carries
//!    its id as `external_id`, or, failing that, has its primary email.
//!    An email match with no `external_id` is an invited account that has
//!    signed up since; it is linked to the provider id.
//! 3. Each missing user is created independently: no email means skipped,
//!    an email taken by the time of insert means skipped with a warning,
//!    anything else that fails is recorded in `errors` and the loop goes on.
//!
//! Every creation appends a `USER_SYNCED` audit event and every link a
//! `USER_LINKED` one. [`link_by_email`] is also used by the auth layer when
//! an unknown caller presents a token.

use serde::{Deserialize, Serialize};
use tucson_core::user::normalize_email;
use tucson_core::{Role, User, UserStatus};
use tucson_identity::{IdentityApiError, IdentityDirectory, ProviderUser};
use utoipa::ToSchema;

use crate::audit::{Actor, AuditAction, NewAuditEvent, SYNC_ACTOR};
use crate::error::AppError;
use crate::state::AppState;

/// Provider users fetched per run.
pub const SYNC_FETCH_LIMIT: u32 = 100;

/// Tag applied to accounts created by the sync.
pub const SYNC_TAG: &str = "clerk-sync";

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub total_fetched: usize,
    pub already_existing: usize,
    /// Existing accounts newly linked to their provider id. Counted in
    /// `already_existing` as well.
    pub linked: usize,
    pub missing: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<SyncFailure>,
}

/// A provider user that could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub provider_id: String,
    pub email: Option<String>,
    pub error: String,
}

/// Progress notifications, in order, for callers that report as they go.
#[derive(Debug, Clone, Copy)]
pub enum SyncProgress<'a> {
    Fetched { total: usize },
    Compared { already_existing: usize, missing: usize },
    Linked { user: &'a User },
    Created { user: &'a User },
    Skipped { provider_id: &'a str, reason: &'a str },
    Failed { provider_id: &'a str, error: &'a str },
}

/// Build the local account for a provider user.
pub fn user_from_provider(provider: &ProviderUser, email: String) -> User {
    let mut user = User::new(
        email,
        provider.first_name.clone().unwrap_or_default(),
        provider.last_name.clone().unwrap_or_default(),
        provider.metadata_role().unwrap_or(Role::Investor),
        UserStatus::Active,
    );
    user.external_id = Some(provider.id.clone());
    user.phone = provider.first_phone().map(String::from);
    user.tags.insert(SYNC_TAG.to_string());
    user
}

fn exists_locally(state: &AppState, provider: &ProviderUser) -> bool {
    if state.user_by_external_id(&provider.id).is_some() {
        return true;
    }
    provider
        .primary_email()
        .is_some_and(|email| state.user_by_email(email).is_some())
}

/// Link the unlinked local account whose email is `provider`'s primary
/// email. Returns the linked account, or `None` when there is nothing to
/// link: no email, no such account, or the account already carries a
/// different provider id.
pub async fn link_by_email(
    state: &AppState,
    provider: &ProviderUser,
    actor: Actor,
) -> Result<Option<User>, AppError> {
    let Some(email) = provider.primary_email() else {
        return Ok(None);
    };
    let Some(local) = state.user_by_email(email) else {
        return Ok(None);
    };
    let now = chrono::Utc::now();
    let linked = state.users.try_update(&local.id, |u| {
        if u.external_id.is_some() {
            return Err(());
        }
        u.external_id = Some(provider.id.clone());
        u.updated_at = now;
        Ok(u.clone())
    });
    let Some(Ok(user)) = linked else {
        return Ok(None);
    };

    if let Err(e) = state.persist_user(&user).await {
        state.users.update(&user.id, |u| {
            if u.external_id.as_deref() == Some(provider.id.as_str()) {
                u.external_id = None;
            }
        });
        return Err(e);
    }
    state
        .record_audit(NewAuditEvent::new(
            AuditAction::UserLinked,
            actor,
            "user",
            user.id,
            serde_json::json!({ "clerkId": provider.id, "email": user.email }),
        ))
        .await;
    tracing::info!(user_id = %user.id, provider_id = %provider.id, "linked local account to identity provider");
    Ok(Some(user))
}

enum Outcome {
    Created(User),
    Skipped(&'static str),
    Failed(String),
}

async fn create_one(state: &AppState, provider: &ProviderUser) -> Outcome {
    let Some(raw_email) = provider.primary_email() else {
        return Outcome::Skipped("no email address");
    };
    let email = match normalize_email(raw_email) {
        Ok(email) => email,
        Err(e) => return Outcome::Failed(e.to_string()),
    };

    let user = user_from_provider(provider, email.clone());
    if state
        .users
        .insert_if_absent(user.id, user.clone(), |u| u.has_email(&email))
        .is_err()
    {
        tracing::warn!(provider_id = %provider.id, email = %email, "email already in use, skipping");
        return Outcome::Skipped("email already in use");
    }

    if let Err(e) = state.persist_user(&user).await {
        state.users.remove(&user.id);
        return Outcome::Failed(e.to_string());
    }

    state
        .record_audit(NewAuditEvent::new(
            AuditAction::UserSynced,
            Actor::System(SYNC_ACTOR),
            "user",
            user.id,
            serde_json::json!({ "clerkId": provider.id, "email": user.email }),
        ))
        .await;
    Outcome::Created(user)
}

/// Run one sync pass. Only the initial fetch can fail the run.
pub async fn sync_users(
    state: &AppState,
    directory: &dyn IdentityDirectory,
    mut progress: impl FnMut(SyncProgress<'_>) + Send,
) -> Result<SyncReport, IdentityApiError> {
    let provider_users = directory.list_users(SYNC_FETCH_LIMIT, 0).await?;
    let mut report = SyncReport {
        total_fetched: provider_users.len(),
        ..SyncReport::default()
    };
    progress(SyncProgress::Fetched {
        total: report.total_fetched,
    });

    let missing: Vec<&ProviderUser> = provider_users
        .iter()
        .filter(|p| !exists_locally(state, p))
        .collect();
    report.missing = missing.len();
    report.already_existing = report.total_fetched - report.missing;
    progress(SyncProgress::Compared {
        already_existing: report.already_existing,
        missing: report.missing,
    });

    for provider in &provider_users {
        if state.user_by_external_id(&provider.id).is_some() {
            continue;
        }
        match link_by_email(state, provider, Actor::System(SYNC_ACTOR)).await {
            Ok(Some(user)) => {
                report.linked += 1;
                progress(SyncProgress::Linked { user: &user });
            }
            Ok(None) => {}
            Err(e) => {
                let error = e.to_string();
                report.failed += 1;
                tracing::error!(provider_id = %provider.id, error = %error, "failed to link existing user");
                progress(SyncProgress::Failed {
                    provider_id: &provider.id,
                    error: &error,
                });
                report.errors.push(SyncFailure {
                    provider_id: provider.id.clone(),
                    email: provider.primary_email().map(String::from),
                    error,
                });
            }
        }
    }

    for provider in missing {
        match create_one(state, provider).await {
            Outcome::Created(user) => {
                report.created += 1;
                tracing::info!(user_id = %user.id, provider_id = %provider.id, "created user from identity provider");
                progress(SyncProgress::Created { user: &user });
            }
            Outcome::Skipped(reason) => {
                report.skipped += 1;
                progress(SyncProgress::Skipped {
                    provider_id: &provider.id,
                    reason,
                });
            }
            Outcome::Failed(error) => {
                report.failed += 1;
                tracing::error!(provider_id = %provider.id, error = %error, "failed to create synced user");
                progress(SyncProgress::Failed {
                    provider_id: &provider.id,
                    error: &error,
                });
                report.errors.push(SyncFailure {
                    provider_id: provider.id.clone(),
                    email: provider.primary_email().map(String::from),
                    error,
                });
            }
        }
    }

    tracing::info!(
        total_fetched = report.total_fetched,
        already_existing = report.already_existing,
        linked = report.linked,
        created = report.created,
        skipped = report.skipped,
        failed = report.failed,
        "identity provider sync finished"
    );
    Ok(report)
}
