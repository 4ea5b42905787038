//! # tucson-api: Axum API for Tucson
//!
//! HTTP surface of the accredited-investor platform: investor submissions
//! and document upload, the admin review console, user management, and
//! identity-provider sync.
//!
//! ## API Surface
//!
//! | Prefix                    | Module                              |
//! |---------------------------|-------------------------------------|
//! | `/health/check`           | [`routes::health`] (no auth)        |
//! | `/verification/*`         | [`routes::verification`]            |
//! | `/admin/verifications/*`  | [`routes::admin_verifications`]     |
//! | `/admin/users/*`          | [`routes::admin_users`]             |
//! | `/users/*`                | [`routes::users`]                   |
//! | `/openapi.json`           | [`openapi`]                         |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```
//!
//! State lives in memory and is written through to PostgreSQL when
//! `DATABASE_URL` is set. Every state change appends to a hash-chained
//! audit log.

pub mod audit;
pub mod auth;
pub mod blob;
pub mod db;
pub mod error;
pub mod expiry;
pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod sync;

use axum::middleware::from_fn_with_state;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::{AppConfig, AppState};

/// Assemble the full application router.
///
/// The health check is mounted outside the auth middleware so it stays
/// reachable without credentials.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::verification::router())
        .merge(routes::admin_verifications::router())
        .merge(routes::admin_users::router())
        .merge(routes::users::router())
        .merge(openapi::router())
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let unauthenticated = routes::health::router().with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}
