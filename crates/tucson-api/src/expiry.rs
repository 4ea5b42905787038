//! # Verification Expiry Sweep
//!
//! Moves every non-terminal verification that is past its deadline to
//! EXPIRED. The deadline is `expiresAt` when set, otherwise
//! `submittedAt + 180 days`. APPROVED records are terminal and are never
//! touched; the status endpoint stops reporting them as accredited once
//! `expiresAt` passes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tucson_state::TransitionError;
use uuid::Uuid;

use crate::audit::{Actor, AuditAction, NewAuditEvent, EXPIRY_ACTOR};
use crate::error::AppError;
use crate::state::AppState;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryReport {
    /// Records that were due when the sweep started.
    pub due: usize,
    /// Records actually expired.
    pub expired: Vec<Uuid>,
}

/// Expire everything due at `now`.
///
/// Each record is re-checked under its write lock, so a review that lands
/// between the scan and the update wins.
pub async fn expire_due(state: &AppState, now: DateTime<Utc>) -> Result<ExpiryReport, AppError> {
    let due: Vec<Uuid> = state
        .verifications
        .filter(|v| v.is_due_for_expiry(now))
        .into_iter()
        .map(|v| v.id)
        .collect();

    let mut report = ExpiryReport {
        due: due.len(),
        expired: Vec::new(),
    };

    for id in due {
        let updated = state.verifications.try_update(&id, |v| {
            if !v.is_due_for_expiry(now) {
                return Ok(None);
            }
            let before = v.clone();
            v.expire(now)?;
            Ok::<_, TransitionError>(Some((before, v.clone())))
        });

        let Some(Ok(Some((before, verification)))) = updated else {
            continue;
        };
        let from = before.status;
        match state.commit_verification(Some(before), &verification).await {
            Ok(()) => {}
            // Already decided or expired elsewhere; the stored copy was adopted.
            Err(AppError::Conflict(_)) => continue,
            Err(e) => return Err(e),
        }
        state
            .record_audit(NewAuditEvent::new(
                AuditAction::VerificationExpired,
                Actor::System(EXPIRY_ACTOR),
                "verification",
                verification.id,
                serde_json::json!({
                    "from": from.as_str(),
                    "userId": verification.user_id,
                }),
            ))
            .await;
        report.expired.push(verification.id);
    }

    if !report.expired.is_empty() {
        tracing::info!(expired = report.expired.len(), "expired overdue verifications");
    }
    Ok(report)
}
