//! # tucson-api: Binary Entry Point
//!
//! Starts the Axum HTTP server. Binds to `PORT` (default 8080) and runs the
//! verification expiry sweep once an hour in the background.

use std::sync::Arc;
use std::time::Duration;

use tucson_api::state::{AppConfig, AppState};
use tucson_identity::{IdentityApiConfig, IdentityClient, IdentityDirectory};

const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();
    if config.auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set: running in development mode, bearer secrets are not checked");
    }
    let port = config.port;

    // Absent means in-memory only.
    let db_pool = tucson_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let identity: Option<Arc<dyn IdentityDirectory>> = match IdentityApiConfig::from_env() {
        Ok(identity_config) => {
            tracing::info!(api_url = %identity_config.api_url, "identity provider configured");
            Some(Arc::new(IdentityClient::new(identity_config)?))
        }
        Err(e) => {
            tracing::warn!("Identity provider not configured: {e}. Invitations are local only and sync returns 503.");
            None
        }
    };

    let state = AppState::with_config(config, identity, db_pool);
    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = tucson_api::expiry::expire_due(&sweeper, chrono::Utc::now()).await {
                tracing::error!(error = %e, "verification expiry sweep failed");
            }
        }
    });

    let app = tucson_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Tucson API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
