//! # OpenAPI Document
//!
//! Collects every `#[utoipa::path]` handler and DTO schema into one
//! OpenAPI document served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Registers the bearer token scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Token of the form `{externalUserId}:{secret}`. The secret is the server's AUTH_TOKEN.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tucson API",
        description = "Accredited-investor verification: investor submissions, document upload, admin review, and user management.\n\nAll endpoints except `/health/check` require `Authorization: Bearer <token>`.",
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        crate::routes::health::health_check,
        // ── Investor verification ───────────────────────────────────────
        crate::routes::verification::get_status,
        crate::routes::verification::submit,
        crate::routes::verification::upload_documents,
        // ── Review console ──────────────────────────────────────────────
        crate::routes::admin_verifications::list_verifications,
        crate::routes::admin_verifications::stats,
        crate::routes::admin_verifications::get_verification,
        crate::routes::admin_verifications::review,
        crate::routes::admin_verifications::batch_review,
        crate::routes::admin_verifications::get_document,
        crate::routes::admin_verifications::record_scan,
        // ── User management ─────────────────────────────────────────────
        crate::routes::admin_users::list_users,
        crate::routes::admin_users::invite_user,
        crate::routes::admin_users::get_user,
        crate::routes::admin_users::update_user,
        crate::routes::admin_users::change_role,
        crate::routes::admin_users::delete_user,
        crate::routes::admin_users::sync_from_provider,
        // ── Self service ────────────────────────────────────────────────
        crate::routes::users::get_profile,
        crate::routes::users::update_profile,
        crate::routes::users::get_preferences,
        crate::routes::users::update_preferences,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::health::HealthResponse,
            crate::audit::AuditEvent,
            crate::sync::SyncReport,
            crate::sync::SyncFailure,
            tucson_core::User,
            tucson_core::Profile,
            tucson_core::Role,
            tucson_core::UserStatus,
            tucson_core::RiskTolerance,
            tucson_core::Document,
            tucson_core::DocumentType,
            tucson_core::ScanStatus,
            tucson_core::VerificationType,
            tucson_core::Amount,
            tucson_core::Pagination,
            tucson_state::Verification,
            tucson_state::VerificationStatus,
            tucson_state::TransitionRecord,
            tucson_state::SubmissionFields,
            crate::routes::verification::VerificationStatusResponse,
            crate::routes::verification::SubmitResponse,
            crate::routes::verification::UploadResponse,
            crate::routes::admin_verifications::UserSummary,
            crate::routes::admin_verifications::VerificationListItem,
            crate::routes::admin_verifications::VerificationListResponse,
            crate::routes::admin_verifications::StatusCounts,
            crate::routes::admin_verifications::VerificationDetail,
            crate::routes::admin_verifications::ReviewRequest,
            crate::routes::admin_verifications::BatchReviewRequest,
            crate::routes::admin_verifications::BatchReviewResponse,
            crate::routes::admin_verifications::BatchFailure,
            crate::routes::admin_verifications::ScanRequest,
            crate::routes::admin_users::UserListResponse,
            crate::routes::admin_users::InviteUserRequest,
            crate::routes::admin_users::UserDetail,
            crate::routes::admin_users::UpdateUserRequest,
            crate::routes::admin_users::ChangeRoleRequest,
            crate::routes::admin_users::DeleteUserResponse,
            crate::routes::users::ProfileResponse,
            crate::routes::users::UpdateProfileRequest,
            crate::routes::users::PreferencesResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and database status"),
        (name = "verification", description = "An investor's own accreditation requests"),
        (name = "admin", description = "Review console and user management"),
        (name = "users", description = "The caller's own profile and preferences"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route_group() {
        let spec = ApiDoc::openapi();
        for path in [
            "/health/check",
            "/verification/submit",
            "/verification/{id}/documents",
            "/admin/verifications/batch-review",
            "/admin/verifications/{id}/documents/{doc_id}",
            "/admin/users/sync-clerk",
            "/users/preferences",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn spec_has_bearer_scheme() {
        let spec = ApiDoc::openapi();
        let components = spec.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn spec_serializes() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("VerificationListResponse"));
    }
}
