//! Health check, mounted outside the auth middleware.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `ok` when the process answers.
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// `connected`, `unreachable`, or `not_configured`.
    pub database: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health/check", get(health_check))
}

#[utoipa::path(
    get,
    path = "/health/check",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    ),
    tag = "health"
)]
pub(crate) async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match &state.db_pool {
        None => "not_configured",
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => "connected",
            Err(e) => {
                tracing::warn!(error = %e, "database health probe failed");
                "unreachable"
            }
        },
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        database: database.to_string(),
    })
}
