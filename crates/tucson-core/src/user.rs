//! # User and Profile Models
//!
//! A [`User`] is the local account record; a [`Profile`] is the optional
//! 1:1 extension holding self-described investor details and preferences.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ValidationError;

// ── Role ────────────────────────────────────────────────────────────────────

/// Roles ordered by privilege level.
///
/// The `Ord` derivation respects declaration order:
/// `Investor < Admin < SuperAdmin`, so `>=` expresses "at least".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Regular platform user.
    Investor,
    /// May review verifications and manage non-super-admin users.
    Admin,
    /// Full access, including role changes and identity-provider sync.
    SuperAdmin,
}

impl Role {
    /// Return the wire representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Investor => "INVESTOR",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// Whether this role grants access to the admin console.
    pub fn is_admin(&self) -> bool {
        *self >= Self::Admin
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INVESTOR" => Ok(Self::Investor),
            "ADMIN" => Ok(Self::Admin),
            "SUPER_ADMIN" => Ok(Self::SuperAdmin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// ── UserStatus ──────────────────────────────────────────────────────────────

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// Account in good standing.
    Active,
    /// Account disabled by an administrator.
    Inactive,
    /// Invited but has not yet signed in.
    Pending,
    /// Account suspended pending investigation.
    Suspended,
}

impl UserStatus {
    /// Return the wire representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Pending => "PENDING",
            Self::Suspended => "SUSPENDED",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "PENDING" => Ok(Self::Pending),
            "SUSPENDED" => Ok(Self::Suspended),
            other => Err(format!("unknown user status: {other}")),
        }
    }
}

// ── User ────────────────────────────────────────────────────────────────────

/// A local user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Local identifier.
    pub id: Uuid,
    /// Identity-provider user id, when the account is linked.
    #[serde(default)]
    pub external_id: Option<String>,
    /// Unique email address, stored lowercase.
    pub email: String,
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Authorization role.
    pub role: Role,
    /// Account status.
    pub status: UserStatus,
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Street address.
    #[serde(default)]
    pub address: Option<String>,
    /// City.
    #[serde(default)]
    pub city: Option<String>,
    /// State or province.
    #[serde(default)]
    pub state: Option<String>,
    /// Postal code.
    #[serde(default)]
    pub zip_code: Option<String>,
    /// Country.
    #[serde(default)]
    pub country: Option<String>,
    /// Date of birth as entered (ISO 8601 date).
    #[serde(default)]
    pub date_of_birth: Option<String>,
    /// Occupation.
    #[serde(default)]
    pub occupation: Option<String>,
    /// Employer.
    #[serde(default)]
    pub employer: Option<String>,
    /// Free-form labels.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create an account with only the required fields populated.
    pub fn new(email: String, first_name: String, last_name: String, role: Role, status: UserStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_id: None,
            email,
            first_name,
            last_name,
            role,
            status,
            phone: None,
            address: None,
            city: None,
            state: None,
            zip_code: None,
            country: None,
            date_of_birth: None,
            occupation: None,
            employer: None,
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// "First Last", collapsing missing parts.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Case-insensitive email comparison.
    pub fn has_email(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim())
    }

    /// Whether the account may act at all.
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Trim and lowercase an email address, rejecting obviously malformed input.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_ascii_lowercase();
    if email.is_empty() {
        return Err(ValidationError::EmptyField("email"));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail(raw.to_string()));
    }
    Ok(email)
}

// ── Profile ─────────────────────────────────────────────────────────────────

/// Self-declared appetite for investment risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    /// Capital preservation first.
    Conservative,
    /// Balanced.
    Moderate,
    /// Growth first.
    Aggressive,
}

/// Optional investor profile, 1:1 with [`User`].
///
/// Every field may be absent; absence renders as "not provided".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Owning user.
    pub user_id: Uuid,
    /// Contact phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Free-text location.
    #[serde(default)]
    pub location: Option<String>,
    /// Company.
    #[serde(default)]
    pub company: Option<String>,
    /// Position or title.
    #[serde(default)]
    pub position: Option<String>,
    /// About me.
    #[serde(default)]
    pub bio: Option<String>,
    /// Personal website.
    #[serde(default)]
    pub website: Option<String>,
    /// LinkedIn URL.
    #[serde(default)]
    pub linked_in: Option<String>,
    /// Asset classes or sectors of interest.
    #[serde(default)]
    pub investment_preferences: Vec<String>,
    /// Risk appetite.
    #[serde(default)]
    pub risk_tolerance: Option<RiskTolerance>,
    /// Free-form UI preferences blob.
    #[serde(default = "empty_object")]
    #[schema(value_type = Object)]
    pub preferences: serde_json::Value,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Profile {
    /// An empty profile for `user_id`.
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            phone: None,
            location: None,
            company: None,
            position: None,
            bio: None,
            website: None,
            linked_in: None,
            investment_preferences: Vec::new(),
            risk_tolerance: None,
            preferences: empty_object(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering_is_correct() {
        assert!(Role::Investor < Role::Admin);
        assert!(Role::Admin < Role::SuperAdmin);
        assert!(Role::SuperAdmin.is_admin());
        assert!(!Role::Investor.is_admin());
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Investor, Role::Admin, Role::SuperAdmin] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("superadmin".parse::<Role>().is_err());
    }

    #[test]
    fn status_serializes_screaming_case() {
        assert_eq!(
            serde_json::to_string(&UserStatus::Suspended).unwrap(),
            "\"SUSPENDED\""
        );
    }

    #[test]
    fn user_serializes_camel_case() {
        let user = User::new(
            "ada@example.com".into(),
            "Ada".into(),
            "Lovelace".into(),
            Role::Investor,
            UserStatus::Active,
        );
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["role"], "INVESTOR");
        assert!(json.get("createdAt").is_some());
        assert_eq!(user.full_name(), "Ada Lovelace");
    }

    #[test]
    fn email_comparison_ignores_case() {
        let user = User::new(
            "ada@example.com".into(),
            String::new(),
            String::new(),
            Role::Investor,
            UserStatus::Active,
        );
        assert!(user.has_email("ADA@Example.com "));
        assert_eq!(user.full_name(), "");
    }

    #[test]
    fn normalize_email_cases() {
        assert_eq!(normalize_email(" Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(matches!(normalize_email(""), Err(ValidationError::EmptyField(_))));
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("a@b").is_err());
        assert!(normalize_email("a@@b.com").is_err());
        assert!(normalize_email("a b@c.com").is_err());
    }

    #[test]
    fn empty_profile_has_object_preferences() {
        let profile = Profile::empty(Uuid::new_v4());
        assert!(profile.preferences.is_object());
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json["linkedIn"].is_null());
    }
}
