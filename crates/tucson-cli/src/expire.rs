//! # expire-verifications
//!
//! Runs the verification expiry sweep once against `DATABASE_URL`, for
//! deployments that schedule it externally instead of relying on the
//! server's hourly sweep.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use tucson_api::expiry::{expire_due, ExpiryReport};
use tucson_api::state::{AppConfig, AppState};

/// Run the expiry command.
pub async fn run_expire_verifications() -> Result<u8> {
    let database_url = std::env::var("DATABASE_URL")
        .ok()
        .filter(|u| !u.is_empty())
        .context("DATABASE_URL must be set")?;
    let pool = tucson_api::db::connect(&database_url)
        .await
        .context("failed to connect to the database")?;

    let state = AppState::with_config(AppConfig::default(), None, Some(pool));
    state
        .hydrate_from_db()
        .await
        .map_err(|e| anyhow!("failed to load verifications: {e}"))?;

    let report = sweep(&state, Utc::now()).await?;
    println!("⏰ {} due, {} expired", report.due, report.expired.len());
    for id in &report.expired {
        println!("   - {id}");
    }
    Ok(0)
}

/// One sweep at `now`.
pub async fn sweep(state: &AppState, now: DateTime<Utc>) -> Result<ExpiryReport> {
    expire_due(state, now)
        .await
        .map_err(|e| anyhow!("expiry sweep failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_state_expires_nothing() {
        let report = sweep(&AppState::new(), Utc::now()).await.unwrap();
        assert_eq!(report, ExpiryReport::default());
    }
}
