//! # sync-users
//!
//! One pass of the identity-provider user sync against the production
//! database. Takes no flags; everything comes from the environment:
//!
//! - `CLERK_SECRET_KEY`, `CLERK_API_URL`: identity provider.
//! - `DATABASE_URL`: required, the accounts being synced into.
//!
//! Exits 0 once the pass completes, even when individual users failed.
//! A failure to reach the database or to fetch the user list exits 1.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tucson_api::state::{AppConfig, AppState};
use tucson_api::sync::{sync_users, SyncProgress, SyncReport};
use tucson_identity::{IdentityApiConfig, IdentityClient, IdentityDirectory};

/// Run the sync command.
pub async fn run_sync_users() -> Result<u8> {
    println!("🔄 Starting identity provider user sync");

    let config = IdentityApiConfig::from_env().context("identity provider is not configured")?;
    let database_url = std::env::var("DATABASE_URL")
        .ok()
        .filter(|u| !u.is_empty())
        .context("DATABASE_URL must be set")?;

    let directory: Arc<dyn IdentityDirectory> = Arc::new(
        IdentityClient::new(config).context("failed to build identity provider client")?,
    );
    let pool = tucson_api::db::connect(&database_url)
        .await
        .context("failed to connect to the database")?;
    println!("🔌 Connected to database");

    let state = AppState::with_config(AppConfig::default(), Some(directory.clone()), Some(pool));
    state
        .hydrate_from_db()
        .await
        .map_err(|e| anyhow!("failed to load existing users: {e}"))?;

    let report = sync_pass(&state, directory.as_ref(), |line| println!("{line}")).await?;
    for line in summary_lines(&report) {
        println!("{line}");
    }
    Ok(0)
}

/// Run [`sync_users`] and hand each progress line to `emit`.
pub async fn sync_pass(
    state: &AppState,
    directory: &dyn IdentityDirectory,
    mut emit: impl FnMut(String) + Send,
) -> Result<SyncReport> {
    sync_users(state, directory, |event| emit(progress_line(&event)))
        .await
        .context("failed to fetch users from the identity provider")
}

/// One human-readable line per progress event.
pub fn progress_line(event: &SyncProgress<'_>) -> String {
    match event {
        SyncProgress::Fetched { total } => format!("📥 Fetched {total} users from identity provider"),
        SyncProgress::Compared {
            already_existing,
            missing,
        } => format!("🔍 {already_existing} already exist, {missing} missing"),
        SyncProgress::Linked { user } => format!("🔗 Linked {} to identity provider", user.email),
        SyncProgress::Created { user } => format!("✅ Created {} ({})", user.email, user.role),
        SyncProgress::Skipped {
            provider_id,
            reason,
        } => format!("⚠️  Skipped {provider_id}: {reason}"),
        SyncProgress::Failed { provider_id, error } => format!("❌ Failed {provider_id}: {error}"),
    }
}

/// Closing summary printed after the pass.
pub fn summary_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![
        "📊 Sync summary".to_string(),
        format!("   Total fetched:    {}", report.total_fetched),
        format!("   Already existing: {}", report.already_existing),
        format!("   Linked:           {}", report.linked),
        format!("   Created:          {}", report.created),
        format!("   Skipped:          {}", report.skipped),
        format!("   Failed:           {}", report.failed),
    ];
    for failure in &report.errors {
        lines.push(format!(
            "   - {} ({}): {}",
            failure.provider_id,
            failure.email.as_deref().unwrap_or("no email"),
            failure.error
        ));
    }
    lines.push("🎉 Sync complete".to_string());
    lines
}
