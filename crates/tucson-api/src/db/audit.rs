//! Audit event persistence.
//!
//! Events arrive with their chain hashes already computed by
//! [`crate::audit::AuditLog`]; this module only stores and reloads them.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::AuditEvent;

/// Append one event.
pub async fn insert(pool: &PgPool, event: &AuditEvent) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_events (id, sequence, action, actor_type, actor_id, resource_type,
         resource_id, metadata, previous_hash, event_hash, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(event.id)
    .bind(event.sequence)
    .bind(&event.action)
    .bind(&event.actor_type)
    .bind(&event.actor_id)
    .bind(&event.resource_type)
    .bind(&event.resource_id)
    .bind(&event.metadata)
    .bind(&event.previous_hash)
    .bind(&event.event_hash)
    .bind(event.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load the whole chain on startup, ordered by sequence.
pub async fn load_all(pool: &PgPool) -> Result<Vec<AuditEvent>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditEventRow>(
        "SELECT id, sequence, action, actor_type, actor_id, resource_type, resource_id,
         metadata, previous_hash, event_hash, created_at
         FROM audit_events ORDER BY sequence",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AuditEventRow::into_record).collect())
}

/// Events from `sequence` on, ordered by sequence.
pub async fn load_from(pool: &PgPool, sequence: i64) -> Result<Vec<AuditEvent>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditEventRow>(
        "SELECT id, sequence, action, actor_type, actor_id, resource_type, resource_id,
         metadata, previous_hash, event_hash, created_at
         FROM audit_events WHERE sequence >= $1 ORDER BY sequence",
    )
    .bind(sequence)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AuditEventRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: Uuid,
    sequence: i64,
    action: String,
    actor_type: String,
    actor_id: String,
    resource_type: String,
    resource_id: String,
    metadata: serde_json::Value,
    previous_hash: String,
    event_hash: String,
    created_at: DateTime<Utc>,
}

impl AuditEventRow {
    fn into_record(self) -> AuditEvent {
        AuditEvent {
            id: self.id,
            sequence: self.sequence,
            action: self.action,
            actor_type: self.actor_type,
            actor_id: self.actor_id,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            metadata: self.metadata,
            previous_hash: self.previous_hash,
            event_hash: self.event_hash,
            created_at: self.created_at,
        }
    }
}
