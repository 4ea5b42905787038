//! # Database Persistence Layer
//!
//! Postgres persistence via SQLx.
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, every
//! mutation of users, profiles, verifications, documents, and audit events
//! is written through to PostgreSQL and the in-memory stores are hydrated
//! from it on startup. When absent, the API runs in-memory only.
//!
//! Enums are stored as their wire strings. Unknown strings on the read
//! path are decode errors rather than silent defaults.

pub mod audit;
pub mod users;
pub mod verifications;

use std::str::FromStr;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tucson_core::Amount;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };
    connect(&url).await.map(Some)
}

/// Connect to `url` and apply embedded migrations.
pub async fn connect(url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// Parse a stored enum string.
pub(crate) fn parse_column<T>(column: &'static str, value: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = String>,
{
    value.parse().map_err(|e: String| {
        tracing::error!(column, value, error = %e, "unrecognised value in database");
        sqlx::Error::Decode(format!("{column}: {e}").into())
    })
}

/// Dollar amounts are `u64` in memory and `BIGINT` in Postgres.
pub(crate) fn amount_to_db(amount: Option<Amount>) -> Result<Option<i64>, sqlx::Error> {
    amount
        .map(|a| i64::try_from(a.0).map_err(|e| sqlx::Error::Encode(Box::new(e))))
        .transpose()
}

pub(crate) fn amount_from_db(value: Option<i64>) -> Result<Option<Amount>, sqlx::Error> {
    value
        .map(|v| {
            u64::try_from(v)
                .map(Amount)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tucson_core::Role;

    #[test]
    fn parse_column_rejects_unknown_values() {
        assert_eq!(parse_column::<Role>("role", "ADMIN").unwrap(), Role::Admin);
        assert!(matches!(
            parse_column::<Role>("role", "OWNER"),
            Err(sqlx::Error::Decode(_))
        ));
    }

    #[test]
    fn amounts_convert_within_range() {
        assert_eq!(amount_to_db(Some(Amount(250_000))).unwrap(), Some(250_000));
        assert_eq!(amount_to_db(None).unwrap(), None);
        assert!(amount_to_db(Some(Amount(u64::MAX))).is_err());
        assert_eq!(amount_from_db(Some(1_000_000)).unwrap(), Some(Amount(1_000_000)));
        assert!(amount_from_db(Some(-1)).is_err());
    }
}
