//! # Self-Service Profile Endpoints
//!
//! The caller's own account fields, investor profile, and UI preferences.
//! A profile row is created lazily on the first write.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tucson_core::{Profile, RiskTolerance, User};
use utoipa::ToSchema;

use crate::audit::{AuditAction, NewAuditEvent};
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_json, non_blank};
use crate::routes::Envelope;
use crate::state::AppState;

// -- DTOs ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user: User,
    pub profile: Option<Profile>,
}

/// Self-service edit. Absent fields are left alone; blank optional fields
/// are cleared. Email, role, and status are not editable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
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
    pub location: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub linked_in: Option<String>,
    pub investment_preferences: Option<Vec<String>>,
    pub risk_tolerance: Option<RiskTolerance>,
}

fn set(slot: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value {
        *slot = non_blank(Some(v));
    }
}

impl UpdateProfileRequest {
    fn apply(self, user: &mut User, profile: &mut Profile) {
        if let Some(first) = self.first_name {
            user.first_name = first.trim().to_string();
        }
        if let Some(last) = self.last_name {
            user.last_name = last.trim().to_string();
        }
        if let Some(phone) = &self.phone {
            profile.phone = non_blank(Some(phone.clone()));
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

        set(&mut profile.location, self.location);
        set(&mut profile.company, self.company);
        set(&mut profile.position, self.position);
        set(&mut profile.bio, self.bio);
        set(&mut profile.website, self.website);
        set(&mut profile.linked_in, self.linked_in);
        if let Some(prefs) = self.investment_preferences {
            profile.investment_preferences = prefs
                .into_iter()
                .filter_map(|p| non_blank(Some(p)))
                .collect();
        }
        if self.risk_tolerance.is_some() {
            profile.risk_tolerance = self.risk_tolerance;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesResponse {
    #[schema(value_type = Object)]
    pub preferences: serde_json::Value,
}

// -- Router -------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/profile", get(get_profile).put(update_profile))
        .route(
            "/users/preferences",
            get(get_preferences).put(update_preferences),
        )
}

// -- Handlers -----------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/users/profile",
    responses(
        (status = 200, description = "Caller's account and profile", body = ProfileResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub(crate) async fn get_profile(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state.users.get(&caller.id()).unwrap_or(caller.user);
    Ok(Json(ProfileResponse {
        profile: state.profiles.get(&user.id),
        user,
    }))
}

#[utoipa::path(
    put,
    path = "/users/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated, wrapped in {success, data}", body = ProfileResponse),
        (status = 404, description = "Account no longer exists", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub(crate) async fn update_profile(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<Envelope<ProfileResponse>>, AppError> {
    let req = extract_json(body)?;
    let id = caller.id();
    let now = Utc::now();

    let mut user = state
        .users
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;
    let mut profile = state.profiles.get(&id).unwrap_or_else(|| Profile::empty(id));
    req.apply(&mut user, &mut profile);
    user.updated_at = now;
    profile.updated_at = now;

    // Only the caller edits these fields, so the last write wins.
    state
        .users
        .update(&id, |u| *u = user.clone())
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;
    state.profiles.insert(id, profile.clone());
    state.persist_user(&user).await?;
    state.persist_profile(&profile).await?;

    state
        .record_audit(NewAuditEvent::new(
            AuditAction::ProfileUpdated,
            caller.actor(),
            "user",
            id,
            serde_json::json!({}),
        ))
        .await;

    Ok(Json(Envelope::ok(ProfileResponse {
        user,
        profile: Some(profile),
    })))
}

#[utoipa::path(
    get,
    path = "/users/preferences",
    responses(
        (status = 200, description = "Caller's UI preferences", body = PreferencesResponse),
    ),
    tag = "users"
)]
pub(crate) async fn get_preferences(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Json<PreferencesResponse> {
    let preferences = state
        .profiles
        .get(&caller.id())
        .map(|p| p.preferences)
        .unwrap_or_else(|| serde_json::json!({}));
    Json(PreferencesResponse { preferences })
}

#[utoipa::path(
    put,
    path = "/users/preferences",
    request_body = PreferencesResponse,
    responses(
        (status = 200, description = "Preferences replaced, wrapped in {success, data}", body = PreferencesResponse),
        (status = 422, description = "Preferences must be a JSON object", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub(crate) async fn update_preferences(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<PreferencesResponse>, JsonRejection>,
) -> Result<Json<Envelope<PreferencesResponse>>, AppError> {
    let req = extract_json(body)?;
    if !req.preferences.is_object() {
        return Err(AppError::Validation("preferences must be a JSON object".into()));
    }
    let id = caller.id();
    let mut profile = state.profiles.get(&id).unwrap_or_else(|| Profile::empty(id));
    profile.preferences = req.preferences;
    profile.updated_at = Utc::now();
    state.profiles.insert(id, profile.clone());
    state.persist_profile(&profile).await?;

    Ok(Json(Envelope::ok(PreferencesResponse {
        preferences: profile.preferences,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tucson_core::{Role, UserStatus};

    #[test]
    fn profile_update_touches_both_records() {
        let mut user = User::new(
            "pat@example.com".into(),
            "Pat".into(),
            "Lee".into(),
            Role::Investor,
            UserStatus::Active,
        );
        let mut profile = Profile::empty(user.id);
        UpdateProfileRequest {
            phone: Some("+15205550100".into()),
            company: Some("Desert Capital".into()),
            investment_preferences: Some(vec!["real estate".into(), "  ".into()]),
            risk_tolerance: Some(RiskTolerance::Moderate),
            ..Default::default()
        }
        .apply(&mut user, &mut profile);

        assert_eq!(user.phone.as_deref(), Some("+15205550100"));
        assert_eq!(profile.phone.as_deref(), Some("+15205550100"));
        assert_eq!(profile.company.as_deref(), Some("Desert Capital"));
        assert_eq!(profile.investment_preferences, vec!["real estate".to_string()]);
        assert_eq!(profile.risk_tolerance, Some(RiskTolerance::Moderate));
        assert_eq!(user.first_name, "Pat");
    }
}
