//! # Authentication Middleware
//!
//! Bearer token middleware that resolves the caller to a local [`User`].
//!
//! ## Token Format
//!
//! ```text
//! Bearer {externalUserId}:{secret}
//! ```
//!
//! `externalUserId` is the identity-provider user id. `secret` is compared
//! against `AUTH_TOKEN` in constant time. When `AUTH_TOKEN` is unset the
//! server runs in development mode: the secret segment is optional and
//! not checked, but a bearer token naming the user is still required.
//!
//! ## Resolving the caller
//!
//! The id is looked up in memory, then in the database. An id still
//! unknown is asked of the identity provider; when its primary email
//! belongs to an invited account that has no provider id yet, the two are
//! linked and the request proceeds.
//!
//! ## Account status
//!
//! A PENDING (invited) account becomes ACTIVE on its first authenticated
//! request. INACTIVE and SUSPENDED accounts are refused with 403.
//!
//! ## CallerIdentity
//!
//! The resolved user is injected into the request extensions. Handlers
//! extract it via the `FromRequestParts` impl and pass it to
//! [`tucson_core::can`] through [`CallerIdentity::require`].

use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use subtle::ConstantTimeEq;
use tucson_core::{can, Action, User, UserStatus};
use uuid::Uuid;

use crate::audit::{Actor, AuditAction, NewAuditEvent, SIGN_IN_ACTOR};
use crate::error::{AppError, ErrorBody, ErrorDetail};
use crate::state::AppState;

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// The authenticated caller, resolved to a local account.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerIdentity {
    pub user: User,
}

impl CallerIdentity {
    /// Local user id of the caller.
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    /// Ask the authorization policy. Returns 403 with the deny reason.
    pub fn require(&self, action: Action, target: Option<&User>) -> Result<(), AppError> {
        can(&self.user, action, target).into_result()?;
        Ok(())
    }

    /// Audit actor for this caller.
    pub fn actor(&self) -> Actor {
        Actor::User(self.user.id)
    }
}

/// Pulls the caller placed in request extensions by the bearer check.
/// Returns 401 if no identity is present.
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets.
///
/// When lengths differ, performs a dummy comparison so timing does not
/// depend on where the mismatch is.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse `{externalUserId}:{secret}` and return the external user id.
///
/// With `expected_secret = None` (development mode) the secret segment is
/// optional and ignored.
pub fn parse_bearer_token(provided: &str, expected_secret: Option<&str>) -> Result<String, String> {
    let (external_id, secret) = match provided.split_once(':') {
        Some((id, secret)) => (id.trim(), Some(secret)),
        None => (provided.trim(), None),
    };
    if external_id.is_empty() {
        return Err("invalid token format: expected {externalUserId}:{secret}".into());
    }
    if let Some(expected) = expected_secret {
        match secret {
            Some(secret) if constant_time_token_eq(secret, expected) => {}
            _ => return Err("invalid bearer token".into()),
        }
    }
    Ok(external_id.to_string())
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the bearer token, resolve the caller's local account, and
/// inject a [`CallerIdentity`] for downstream handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let provided = match auth_header {
        Some(value) => match value.strip_prefix("Bearer ") {
            Some(token) => token,
            None => {
                tracing::warn!("authentication failed: non-Bearer authorization scheme");
                return unauthorized_response("authorization header must use Bearer scheme");
            }
        },
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            return unauthorized_response("missing authorization header");
        }
    };

    let external_id = match parse_bearer_token(provided, state.config.auth_token.as_deref()) {
        Ok(id) => id,
        Err(msg) => {
            tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
            return unauthorized_response(&msg);
        }
    };

    let user = match resolve_caller(&state, &external_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(external_id = %external_id, "authentication failed: no linked account");
            return unauthorized_response("no account is linked to this identity");
        }
        Err(err) => return err.into_response(),
    };

    let user = match user.status {
        UserStatus::Active => user,
        UserStatus::Pending => match activate(&state, user).await {
            Ok(user) => user,
            Err(err) => return err.into_response(),
        },
        UserStatus::Inactive | UserStatus::Suspended => {
            tracing::warn!(user_id = %user.id, status = %user.status, "refused request from disabled account");
            return AppError::Forbidden("account is not active".into()).into_response();
        }
    };

    request.extensions_mut().insert(CallerIdentity { user });
    next.run(request).await
}

/// Local account for an identity-provider id, linking an invited account
/// through the identity provider when nothing is linked yet.
async fn resolve_caller(state: &AppState, external_id: &str) -> Result<Option<User>, AppError> {
    if let Some(user) = state.find_user_by_external_id(external_id).await? {
        return Ok(Some(user));
    }
    let Some(directory) = &state.identity else {
        return Ok(None);
    };
    let provider = match directory.get_user(external_id).await {
        Ok(Some(provider)) => provider,
        Ok(None) => return Ok(None),
        Err(e) => {
            tracing::warn!(external_id, error = %e, "identity provider lookup failed during sign-in");
            return Ok(None);
        }
    };
    crate::sync::link_by_email(state, &provider, Actor::System(SIGN_IN_ACTOR)).await
}

/// First sign-in of an invited account.
async fn activate(state: &AppState, user: User) -> Result<User, AppError> {
    let now = Utc::now();
    let updated = state
        .users
        .update(&user.id, |u| {
            if u.status == UserStatus::Pending {
                u.status = UserStatus::Active;
                u.updated_at = now;
            }
        })
        .ok_or_else(|| AppError::Unauthorized("no account is linked to this identity".into()))?;
    state.persist_user(&updated).await?;
    state
        .record_audit(NewAuditEvent::new(
            AuditAction::UserActivated,
            Actor::User(updated.id),
            "user",
            updated.id,
            serde_json::json!({ "email": updated.email }),
        ))
        .await;
    tracing::info!(user_id = %updated.id, "activated invited account on first sign-in");
    Ok(updated)
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
