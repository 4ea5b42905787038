//! # Admin User Management
//!
//! | Method | Path                        | Policy action            |
//! |--------|-----------------------------|--------------------------|
//! | GET    | `/admin/users`              | `ViewUsers`              |
//! | POST   | `/admin/users`              | `InviteUser { role }`    |
//! | GET    | `/admin/users/:id`          | `ViewUsers`              |
//! | PUT    | `/admin/users/:id`          | `UpdateUser` (+ `ChangeRole` if the role changes) |
//! | PUT    | `/admin/users/:id/role`     | `ChangeRole`             |
//! | DELETE | `/admin/users/:id`          | `DeleteUser`             |
//! | POST   | `/admin/users/sync-clerk`   | `SyncUsers`              |

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tucson_core::user::normalize_email;
use tucson_core::{Action, PageParams, Pagination, Profile, Role, User, UserStatus};
use tucson_identity::InvitationRequest;
use tucson_state::Verification;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::audit::{AuditAction, NewAuditEvent};
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, non_blank};
use crate::routes::{matches_search, Envelope};
use crate::state::AppState;
use crate::sync::{sync_users, SyncReport};

// -- DTOs ---------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Matches email or name.
    pub search: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub data: Vec<User>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteUserRequest {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Defaults to INVESTOR.
    #[serde(default)]
    pub role: Option<Role>,
    /// Where the invitation link lands after sign-up.
    #[serde(default)]
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub profile: Option<Profile>,
    /// The user's verification requests, newest first.
    pub verifications: Vec<Verification>,
}

/// Admin edit. Absent fields are left alone; a blank optional field is
/// cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub date_of_birth: Option<String>,
    pub occupation: Option<String>,
    pub employer: Option<String>,
    pub status: Option<UserStatus>,
    pub role: Option<Role>,
    pub tags: Option<BTreeSet<String>>,
}

impl UpdateUserRequest {
    fn apply(self, user: &mut User) {
        fn set(slot: &mut Option<String>, value: Option<String>) {
            if let Some(v) = value {
                *slot = non_blank(Some(v));
            }
        }

        if let Some(first) = self.first_name {
            user.first_name = first.trim().to_string();
        }
        if let Some(last) = self.last_name {
            user.last_name = last.trim().to_string();
        }
        set(&mut user.phone, self.phone);
        set(&mut user.address, self.address);
        set(&mut user.city, self.city);
        set(&mut user.state, self.state);
        set(&mut user.zip_code, self.zip_code);
        set(&mut user.country, self.country);
        set(&mut user.date_of_birth, self.date_of_birth);
        set(&mut user.occupation, self.occupation);
        set(&mut user.employer, self.employer);
        if let Some(status) = self.status {
            user.status = status;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(tags) = self.tags {
            user.tags = tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRoleRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserResponse {
    pub id: Uuid,
    pub deleted_verifications: usize,
}

// -- Router -------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users).post(invite_user))
        .route("/admin/users/sync-clerk", post(sync_from_provider))
        .route(
            "/admin/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/admin/users/:id/role", put(change_role))
}

fn load_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    state
        .users
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))
}

// -- Handlers -----------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/admin/users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "One page of users", body = UserListResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn list_users(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> Result<Json<UserListResponse>, AppError> {
    caller.require(Action::ViewUsers, None)?;
    let query = extract_query(query)?;
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut users = state.users.filter(|u| {
        query.role.map_or(true, |r| u.role == r)
            && query.status.map_or(true, |s| u.status == s)
            && search.map_or(true, |needle| {
                matches_search(needle, &[u.email.as_str(), u.full_name().as_str()])
            })
    });
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let (data, pagination) = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .slice(users);
    Ok(Json(UserListResponse { data, pagination }))
}

#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = InviteUserRequest,
    responses(
        (status = 201, description = "User invited, wrapped in {success, data}", body = User),
        (status = 403, description = "Role not permitted", body = crate::error::ErrorBody),
        (status = 409, description = "Email already in use", body = crate::error::ErrorBody),
        (status = 502, description = "Identity provider failed", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn invite_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<InviteUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<User>>), AppError> {
    let req = extract_json(body)?;
    let role = req.role.unwrap_or(Role::Investor);
    caller.require(Action::InviteUser { role }, None)?;
    let email = normalize_email(&req.email)?;

    if state.user_by_email(&email).is_some() {
        return Err(AppError::Conflict(format!("a user with email {email} already exists")));
    }

    let invitation_id = match &state.identity {
        Some(directory) => {
            let invitation = directory
                .create_invitation(&InvitationRequest {
                    email_address: email.clone(),
                    public_metadata: serde_json::json!({ "role": role.as_str() }),
                    redirect_url: non_blank(req.redirect_url),
                })
                .await?;
            Some(invitation.id)
        }
        None => {
            tracing::warn!(email = %email, "no identity provider configured, creating local user without invitation");
            None
        }
    };

    let user = User::new(
        email.clone(),
        non_blank(req.first_name).unwrap_or_default(),
        non_blank(req.last_name).unwrap_or_default(),
        role,
        UserStatus::Pending,
    );
    state
        .users
        .insert_if_absent(user.id, user.clone(), |u| u.has_email(&email))
        .map_err(|_| AppError::Conflict(format!("a user with email {email} already exists")))?;
    if let Err(e) = state.persist_user(&user).await {
        state.users.remove(&user.id);
        return Err(e);
    }

    state
        .record_audit(NewAuditEvent::new(
            AuditAction::UserInvited,
            caller.actor(),
            "user",
            user.id,
            serde_json::json!({
                "email": user.email,
                "role": role.as_str(),
                "invitationId": invitation_id,
            }),
        ))
        .await;
    tracing::info!(user_id = %user.id, role = %role.as_str(), "user invited");

    Ok((StatusCode::CREATED, Json(Envelope::ok(user))))
}

#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User with profile and verifications", body = UserDetail),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn get_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDetail>, AppError> {
    caller.require(Action::ViewUsers, None)?;
    let user = load_user(&state, id)?;
    let mut verifications = state.verifications.filter(|v| v.user_id == id);
    verifications.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    Ok(Json(UserDetail {
        profile: state.profiles.get(&id),
        user,
        verifications,
    }))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated, wrapped in {success, data}", body = User),
        (status = 403, description = "Not permitted", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn update_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<Envelope<User>>, AppError> {
    let req = extract_json(body)?;
    let target = load_user(&state, id)?;
    caller.require(Action::UpdateUser, Some(&target))?;
    let role_change = req.role.filter(|r| *r != target.role);
    if role_change.is_some() {
        caller.require(Action::ChangeRole, Some(&target))?;
    }
    let status_change = req.status.filter(|s| *s != target.status);

    let now = Utc::now();
    let updated = state
        .users
        .update(&id, |u| {
            req.apply(u);
            u.updated_at = now;
        })
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;
    state.persist_user(&updated).await?;

    let mut metadata = serde_json::json!({});
    if let Some(role) = role_change {
        metadata["role"] = serde_json::json!({ "from": target.role.as_str(), "to": role.as_str() });
    }
    if let Some(status) = status_change {
        metadata["status"] = serde_json::json!({ "from": target.status.as_str(), "to": status.as_str() });
    }
    state
        .record_audit(NewAuditEvent::new(
            AuditAction::UserUpdated,
            caller.actor(),
            "user",
            id,
            metadata,
        ))
        .await;

    Ok(Json(Envelope::ok(updated)))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Role changed, wrapped in {success, data}", body = User),
        (status = 403, description = "SUPER_ADMIN required, or own role", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn change_role(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ChangeRoleRequest>, JsonRejection>,
) -> Result<Json<Envelope<User>>, AppError> {
    let req = extract_json(body)?;
    let target = load_user(&state, id)?;
    caller.require(Action::ChangeRole, Some(&target))?;

    let now = Utc::now();
    let updated = state
        .users
        .update(&id, |u| {
            u.role = req.role;
            u.updated_at = now;
        })
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;
    state.persist_user(&updated).await?;
    state
        .record_audit(NewAuditEvent::new(
            AuditAction::UserRoleChanged,
            caller.actor(),
            "user",
            id,
            serde_json::json!({ "from": target.role.as_str(), "to": req.role.as_str() }),
        ))
        .await;
    tracing::info!(user_id = %id, from = target.role.as_str(), to = req.role.as_str(), "role changed");

    Ok(Json(Envelope::ok(updated)))
}

#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted, wrapped in {success, data}", body = DeleteUserResponse),
        (status = 403, description = "Not permitted", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn delete_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<DeleteUserResponse>>, AppError> {
    let target = load_user(&state, id)?;
    caller.require(Action::DeleteUser, Some(&target))?;

    state.delete_user_row(id).await?;
    let user = state
        .users
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;
    state.profiles.remove(&id);

    let owned = state.verifications.filter(|v| v.user_id == id);
    for verification in &owned {
        state.verifications.remove(&verification.id);
        for document in &verification.documents {
            if let Err(e) = state.blobs.delete(&document.storage_key(verification.id)).await {
                tracing::warn!(document_id = %document.id, error = %e, "failed to delete document blob");
            }
        }
    }

    state
        .record_audit(NewAuditEvent::new(
            AuditAction::UserDeleted,
            caller.actor(),
            "user",
            id,
            serde_json::json!({
                "email": user.email,
                "role": user.role.as_str(),
                "deletedVerifications": owned.len(),
            }),
        ))
        .await;
    tracing::info!(user_id = %id, verifications = owned.len(), "user deleted");

    Ok(Json(Envelope::ok(DeleteUserResponse {
        id,
        deleted_verifications: owned.len(),
    })))
}

#[utoipa::path(
    post,
    path = "/admin/users/sync-clerk",
    responses(
        (status = 200, description = "Sync report, wrapped in {success, data}", body = SyncReport),
        (status = 403, description = "SUPER_ADMIN required", body = crate::error::ErrorBody),
        (status = 502, description = "Identity provider failed", body = crate::error::ErrorBody),
        (status = 503, description = "No identity provider configured", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub(crate) async fn sync_from_provider(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Envelope<SyncReport>>, AppError> {
    caller.require(Action::SyncUsers, None)?;
    let directory = state
        .identity
        .clone()
        .ok_or_else(|| AppError::Unavailable("identity provider is not configured".into()))?;
    let report = sync_users(&state, directory.as_ref(), |_| {}).await?;
    Ok(Json(Envelope::ok(report)))
}
