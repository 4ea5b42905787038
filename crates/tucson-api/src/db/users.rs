//! User and profile persistence operations.
//!
//! Operates on the `users` and `profiles` tables. Email uniqueness is
//! enforced both in memory and by a unique index on `LOWER(email)`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tucson_core::{Profile, RiskTolerance, User};
use uuid::Uuid;

use super::parse_column;

/// Insert or replace a user.
pub async fn upsert(pool: &PgPool, user: &User) -> Result<(), sqlx::Error> {
    let tags: Vec<String> = user.tags.iter().cloned().collect();
    sqlx::query(
        "INSERT INTO users (id, external_id, email, first_name, last_name, role, status,
         phone, address, city, state, zip_code, country, date_of_birth, occupation, employer,
         tags, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
         ON CONFLICT (id) DO UPDATE SET
            external_id = EXCLUDED.external_id, email = EXCLUDED.email,
            first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name,
            role = EXCLUDED.role, status = EXCLUDED.status, phone = EXCLUDED.phone,
            address = EXCLUDED.address, city = EXCLUDED.city, state = EXCLUDED.state,
            zip_code = EXCLUDED.zip_code, country = EXCLUDED.country,
            date_of_birth = EXCLUDED.date_of_birth, occupation = EXCLUDED.occupation,
            employer = EXCLUDED.employer, tags = EXCLUDED.tags, updated_at = EXCLUDED.updated_at",
    )
    .bind(user.id)
    .bind(&user.external_id)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(user.role.as_str())
    .bind(user.status.as_str())
    .bind(&user.phone)
    .bind(&user.address)
    .bind(&user.city)
    .bind(&user.state)
    .bind(&user.zip_code)
    .bind(&user.country)
    .bind(&user.date_of_birth)
    .bind(&user.occupation)
    .bind(&user.employer)
    .bind(&tags)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete a user. Returns whether a row was removed.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all users on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, external_id, email, first_name, last_name, role, status, phone, address,
         city, state, zip_code, country, date_of_birth, occupation, employer, tags,
         created_at, updated_at
         FROM users ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(UserRow::into_record).collect()
}

/// The user linked to an identity-provider id, if any.
pub async fn find_by_external_id(pool: &PgPool, external_id: &str) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, external_id, email, first_name, last_name, role, status, phone, address,
         city, state, zip_code, country, date_of_birth, occupation, employer, tags,
         created_at, updated_at
         FROM users WHERE external_id = $1",
    )
    .bind(external_id)
    .fetch_optional(pool)
    .await?;

    row.map(UserRow::into_record).transpose()
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    external_id: Option<String>,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    status: String,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
    country: Option<String>,
    date_of_birth: Option<String>,
    occupation: Option<String>,
    employer: Option<String>,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_record(self) -> Result<User, sqlx::Error> {
        Ok(User {
            id: self.id,
            external_id: self.external_id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role: parse_column("users.role", &self.role)?,
            status: parse_column("users.status", &self.status)?,
            phone: self.phone,
            address: self.address,
            city: self.city,
            state: self.state,
            zip_code: self.zip_code,
            country: self.country,
            date_of_birth: self.date_of_birth,
            occupation: self.occupation,
            employer: self.employer,
            tags: self.tags.into_iter().collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// -- Profiles -----------------------------------------------------------------

fn risk_to_db(risk: Option<RiskTolerance>) -> Result<Option<String>, sqlx::Error> {
    risk.map(|r| match serde_json::to_value(r) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        Ok(other) => Err(sqlx::Error::Encode(
            format!("risk tolerance serialized to {other}").into(),
        )),
        Err(e) => Err(sqlx::Error::Encode(Box::new(e))),
    })
    .transpose()
}

fn risk_from_db(value: Option<String>) -> Result<Option<RiskTolerance>, sqlx::Error> {
    value
        .map(|s| {
            serde_json::from_value(serde_json::Value::String(s))
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))
        })
        .transpose()
}

/// Insert or replace a profile.
pub async fn upsert_profile(pool: &PgPool, profile: &Profile) -> Result<(), sqlx::Error> {
    let risk = risk_to_db(profile.risk_tolerance)?;
    sqlx::query(
        "INSERT INTO profiles (user_id, phone, location, company, position, bio, website,
         linked_in, investment_preferences, risk_tolerance, preferences, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         ON CONFLICT (user_id) DO UPDATE SET
            phone = EXCLUDED.phone, location = EXCLUDED.location, company = EXCLUDED.company,
            position = EXCLUDED.position, bio = EXCLUDED.bio, website = EXCLUDED.website,
            linked_in = EXCLUDED.linked_in,
            investment_preferences = EXCLUDED.investment_preferences,
            risk_tolerance = EXCLUDED.risk_tolerance, preferences = EXCLUDED.preferences,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(profile.user_id)
    .bind(&profile.phone)
    .bind(&profile.location)
    .bind(&profile.company)
    .bind(&profile.position)
    .bind(&profile.bio)
    .bind(&profile.website)
    .bind(&profile.linked_in)
    .bind(&profile.investment_preferences)
    .bind(&risk)
    .bind(&profile.preferences)
    .bind(profile.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load all profiles on startup.
pub async fn load_all_profiles(pool: &PgPool) -> Result<Vec<Profile>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProfileRow>(
        "SELECT user_id, phone, location, company, position, bio, website, linked_in,
         investment_preferences, risk_tolerance, preferences, updated_at
         FROM profiles",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ProfileRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    phone: Option<String>,
    location: Option<String>,
    company: Option<String>,
    position: Option<String>,
    bio: Option<String>,
    website: Option<String>,
    linked_in: Option<String>,
    investment_preferences: Vec<String>,
    risk_tolerance: Option<String>,
    preferences: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl ProfileRow {
    fn into_record(self) -> Result<Profile, sqlx::Error> {
        Ok(Profile {
            user_id: self.user_id,
            phone: self.phone,
            location: self.location,
            company: self.company,
            position: self.position,
            bio: self.bio,
            website: self.website,
            linked_in: self.linked_in,
            investment_preferences: self.investment_preferences,
            risk_tolerance: risk_from_db(self.risk_tolerance)?,
            preferences: self.preferences,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_tolerance_uses_lowercase_wire_form() {
        assert_eq!(
            risk_to_db(Some(RiskTolerance::Aggressive)).unwrap().as_deref(),
            Some("aggressive")
        );
        assert_eq!(
            risk_from_db(Some("moderate".into())).unwrap(),
            Some(RiskTolerance::Moderate)
        );
        assert!(risk_from_db(Some("reckless".into())).is_err());
        assert_eq!(risk_to_db(None).unwrap(), None);
    }
}
