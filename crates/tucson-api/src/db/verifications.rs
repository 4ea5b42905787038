//! Verification and document persistence operations.
//!
//! A verification row and its document rows are written in one
//! transaction. Lifecycle rules are enforced by
//! [`tucson_state::transition`]; the upsert additionally refuses to move a
//! row out of a terminal status, so a process holding a stale copy cannot
//! overwrite a decision or an expiry written by another one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tucson_core::Document;
use tucson_state::{TransitionRecord, Verification};
use uuid::Uuid;

use super::{amount_from_db, amount_to_db, parse_column};

fn serialize_transitions(log: &[TransitionRecord]) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(log).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize verification transitions");
        sqlx::Error::Encode(Box::new(e))
    })
}

/// Stored statuses that [`upsert`] will not move away from.
const TERMINAL_STATUSES: [&str; 3] = ["APPROVED", "REJECTED", "EXPIRED"];

/// Insert or replace a verification and all of its documents.
///
/// Returns `false`, writing nothing, when the stored row is terminal and
/// `v` would change its status or its decision. Document scan results on a
/// terminal row are still written.
pub async fn upsert(pool: &PgPool, v: &Verification) -> Result<bool, sqlx::Error> {
    let transitions = serialize_transitions(&v.transitions)?;
    let mut tx = pool.begin().await?;

    let written = sqlx::query(
        "INSERT INTO verifications (id, user_id, verification_type, status, annual_income,
         income_source, net_worth, liquid_net_worth, attestation, consent_to_verify,
         submitted_at, reviewed_at, reviewed_by, review_notes, rejection_reason, expires_at,
         transitions, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
         ON CONFLICT (id) DO UPDATE SET
            verification_type = EXCLUDED.verification_type, status = EXCLUDED.status,
            annual_income = EXCLUDED.annual_income, income_source = EXCLUDED.income_source,
            net_worth = EXCLUDED.net_worth, liquid_net_worth = EXCLUDED.liquid_net_worth,
            attestation = EXCLUDED.attestation, consent_to_verify = EXCLUDED.consent_to_verify,
            submitted_at = EXCLUDED.submitted_at, reviewed_at = EXCLUDED.reviewed_at,
            reviewed_by = EXCLUDED.reviewed_by, review_notes = EXCLUDED.review_notes,
            rejection_reason = EXCLUDED.rejection_reason, expires_at = EXCLUDED.expires_at,
            transitions = EXCLUDED.transitions, updated_at = EXCLUDED.updated_at
         WHERE verifications.status <> ALL($19)
            OR (verifications.status = EXCLUDED.status
                AND verifications.reviewed_at IS NOT DISTINCT FROM EXCLUDED.reviewed_at)",
    )
    .bind(v.id)
    .bind(v.user_id)
    .bind(v.verification_type.as_str())
    .bind(v.status.as_str())
    .bind(amount_to_db(v.annual_income)?)
    .bind(&v.income_source)
    .bind(amount_to_db(v.net_worth)?)
    .bind(amount_to_db(v.liquid_net_worth)?)
    .bind(v.attestation)
    .bind(v.consent_to_verify)
    .bind(v.submitted_at)
    .bind(v.reviewed_at)
    .bind(v.reviewed_by)
    .bind(&v.review_notes)
    .bind(&v.rejection_reason)
    .bind(v.expires_at)
    .bind(&transitions)
    .bind(v.updated_at)
    .bind(&TERMINAL_STATUSES[..])
    .execute(&mut *tx)
    .await?;

    if written.rows_affected() == 0 {
        tx.rollback().await?;
        tracing::warn!(
            verification_id = %v.id,
            status = %v.status,
            "refused to overwrite a terminal verification"
        );
        return Ok(false);
    }

    for doc in &v.documents {
        let file_size = i64::try_from(doc.file_size).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        sqlx::query(
            "INSERT INTO verification_documents (id, verification_id, document_type, file_name,
             file_size, mime_type, virus_scan_status, storage_key, uploaded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO UPDATE SET virus_scan_status = EXCLUDED.virus_scan_status",
        )
        .bind(doc.id)
        .bind(v.id)
        .bind(doc.document_type.as_str())
        .bind(&doc.file_name)
        .bind(file_size)
        .bind(&doc.mime_type)
        .bind(doc.virus_scan_status.as_str())
        .bind(doc.storage_key(v.id))
        .bind(doc.uploaded_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// Load one verification with its documents.
pub async fn load_one(pool: &PgPool, id: Uuid) -> Result<Option<Verification>, sqlx::Error> {
    let row = sqlx::query_as::<_, VerificationRow>(
        "SELECT id, user_id, verification_type, status, annual_income, income_source, net_worth,
         liquid_net_worth, attestation, consent_to_verify, submitted_at, reviewed_at,
         reviewed_by, review_notes, rejection_reason, expires_at, transitions, updated_at
         FROM verifications WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };

    let documents = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, verification_id, document_type, file_name, file_size, mime_type,
         virus_scan_status, uploaded_at
         FROM verification_documents WHERE verification_id = $1 ORDER BY uploaded_at, id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(DocumentRow::into_record)
    .collect::<Result<Vec<_>, _>>()?;

    row.into_record(documents).map(Some)
}

/// Load all verifications with their documents on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Verification>, sqlx::Error> {
    let rows = sqlx::query_as::<_, VerificationRow>(
        "SELECT id, user_id, verification_type, status, annual_income, income_source, net_worth,
         liquid_net_worth, attestation, consent_to_verify, submitted_at, reviewed_at,
         reviewed_by, review_notes, rejection_reason, expires_at, transitions, updated_at
         FROM verifications ORDER BY submitted_at",
    )
    .fetch_all(pool)
    .await?;

    let doc_rows = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, verification_id, document_type, file_name, file_size, mime_type,
         virus_scan_status, uploaded_at
         FROM verification_documents ORDER BY uploaded_at, id",
    )
    .fetch_all(pool)
    .await?;

    let mut documents: HashMap<Uuid, Vec<Document>> = HashMap::new();
    for row in doc_rows {
        let verification_id = row.verification_id;
        documents
            .entry(verification_id)
            .or_default()
            .push(row.into_record()?);
    }

    rows.into_iter()
        .map(|row| {
            let docs = documents.remove(&row.id).unwrap_or_default();
            row.into_record(docs)
        })
        .collect()
}

#[derive(sqlx::FromRow)]
struct VerificationRow {
    id: Uuid,
    user_id: Uuid,
    verification_type: String,
    status: String,
    annual_income: Option<i64>,
    income_source: Option<String>,
    net_worth: Option<i64>,
    liquid_net_worth: Option<i64>,
    attestation: bool,
    consent_to_verify: bool,
    submitted_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    reviewed_by: Option<Uuid>,
    review_notes: Option<String>,
    rejection_reason: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    transitions: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl VerificationRow {
    fn into_record(self, documents: Vec<Document>) -> Result<Verification, sqlx::Error> {
        let transitions: Vec<TransitionRecord> =
            serde_json::from_value(self.transitions).map_err(|e| {
                tracing::error!(verification_id = %self.id, error = %e, "failed to deserialize transitions");
                sqlx::Error::Decode(Box::new(e))
            })?;
        Ok(Verification {
            id: self.id,
            user_id: self.user_id,
            verification_type: parse_column("verifications.verification_type", &self.verification_type)?,
            status: parse_column("verifications.status", &self.status)?,
            annual_income: amount_from_db(self.annual_income)?,
            income_source: self.income_source,
            net_worth: amount_from_db(self.net_worth)?,
            liquid_net_worth: amount_from_db(self.liquid_net_worth)?,
            attestation: self.attestation,
            consent_to_verify: self.consent_to_verify,
            submitted_at: self.submitted_at,
            reviewed_at: self.reviewed_at,
            reviewed_by: self.reviewed_by,
            review_notes: self.review_notes,
            rejection_reason: self.rejection_reason,
            expires_at: self.expires_at,
            documents,
            transitions,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    verification_id: Uuid,
    document_type: String,
    file_name: String,
    file_size: i64,
    mime_type: String,
    virus_scan_status: String,
    uploaded_at: DateTime<Utc>,
}

impl DocumentRow {
    fn into_record(self) -> Result<Document, sqlx::Error> {
        Ok(Document {
            id: self.id,
            document_type: parse_column("verification_documents.document_type", &self.document_type)?,
            file_name: self.file_name,
            file_size: u64::try_from(self.file_size).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            mime_type: self.mime_type,
            virus_scan_status: parse_column(
                "verification_documents.virus_scan_status",
                &self.virus_scan_status,
            )?,
            uploaded_at: self.uploaded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tucson_state::VerificationStatus;

    #[test]
    fn guard_lists_exactly_the_terminal_statuses() {
        let terminal: Vec<&str> = VerificationStatus::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .map(|s| s.as_str())
            .collect();
        assert_eq!(terminal, TERMINAL_STATUSES.to_vec());
    }
}
