//! # Audit Log
//!
//! Append-only, tamper-evident record of every mutation: verification
//! submissions and decisions, document uploads and scan results, user
//! invitations, edits, role changes, deletions, and identity-provider sync.
//!
//! Each event's hash is `SHA-256(previous_hash || sequence || action ||
//! actor || resource || metadata || created_at)`. The first event chains
//! to the all-zero hash. The chain is computed in memory under one lock so
//! concurrent appends cannot fork it; the database copy stores the
//! precomputed hashes.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Hash the first event chains to.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Actor recorded for events raised by the identity-provider sync.
pub const SYNC_ACTOR: &str = "system sync";

/// Actor recorded for events raised by the expiry sweep.
pub const EXPIRY_ACTOR: &str = "expiry sweep";

/// Actor recorded when a first sign-in links an invited account.
pub const SIGN_IN_ACTOR: &str = "sign-in";

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    VerificationSubmitted,
    VerificationResubmitted,
    VerificationReviewed,
    VerificationExpired,
    DocumentUploaded,
    DocumentScanned,
    UserActivated,
    UserInvited,
    UserUpdated,
    UserRoleChanged,
    UserDeleted,
    UserSynced,
    UserLinked,
    ProfileUpdated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VerificationSubmitted => "VERIFICATION_SUBMITTED",
            Self::VerificationResubmitted => "VERIFICATION_RESUBMITTED",
            Self::VerificationReviewed => "VERIFICATION_REVIEWED",
            Self::VerificationExpired => "VERIFICATION_EXPIRED",
            Self::DocumentUploaded => "DOCUMENT_UPLOADED",
            Self::DocumentScanned => "DOCUMENT_SCANNED",
            Self::UserActivated => "USER_ACTIVATED",
            Self::UserInvited => "USER_INVITED",
            Self::UserUpdated => "USER_UPDATED",
            Self::UserRoleChanged => "USER_ROLE_CHANGED",
            Self::UserDeleted => "USER_DELETED",
            Self::UserSynced => "USER_SYNCED",
            Self::UserLinked => "USER_LINKED",
            Self::ProfileUpdated => "PROFILE_UPDATED",
        }
    }
}

/// Who did it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// An authenticated local user.
    User(Uuid),
    /// A background process, named.
    System(&'static str),
}

impl Actor {
    fn type_str(&self) -> &'static str {
        match self {
            Self::User(_) => "USER",
            Self::System(_) => "SYSTEM",
        }
    }

    fn id_string(&self) -> String {
        match self {
            Self::User(id) => id.to_string(),
            Self::System(name) => (*name).to_string(),
        }
    }
}

/// An event about to be appended.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub action: AuditAction,
    pub actor: Actor,
    pub resource_type: &'static str,
    pub resource_id: String,
    pub metadata: serde_json::Value,
}

impl NewAuditEvent {
    pub fn new(
        action: AuditAction,
        actor: Actor,
        resource_type: &'static str,
        resource_id: impl ToString,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            action,
            actor,
            resource_type,
            resource_id: resource_id.to_string(),
            metadata,
        }
    }
}

/// A recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: Uuid,
    /// Position in the chain, starting at 0.
    pub sequence: i64,
    pub action: String,
    /// `USER` or `SYSTEM`.
    pub actor_type: String,
    pub actor_id: String,
    pub resource_type: String,
    pub resource_id: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub previous_hash: String,
    pub event_hash: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    fn compute_hash(&self) -> String {
        let input = format!(
            "{}{}{}{}{}{}{}{}{}",
            self.previous_hash,
            self.sequence,
            self.action,
            self.actor_type,
            self.actor_id,
            self.resource_type,
            self.resource_id,
            self.metadata,
            self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        );
        sha256_hex(&input)
    }
}

/// Result of chain integrity verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainIntegrity {
    pub total_events: usize,
    pub broken_links: usize,
    pub chain_valid: bool,
}

/// In-memory hash-chained event log.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, chaining it to the current head.
    pub fn append(&self, event: NewAuditEvent) -> AuditEvent {
        let mut events = self.events.lock();
        let previous_hash = events
            .last()
            .map_or_else(|| GENESIS_HASH.to_string(), |e| e.event_hash.clone());
        let mut recorded = AuditEvent {
            id: Uuid::new_v4(),
            sequence: events.len() as i64,
            action: event.action.as_str().to_string(),
            actor_type: event.actor.type_str().to_string(),
            actor_id: event.actor.id_string(),
            resource_type: event.resource_type.to_string(),
            resource_id: event.resource_id,
            metadata: event.metadata,
            previous_hash,
            event_hash: String::new(),
            created_at: Utc::now(),
        };
        recorded.event_hash = recorded.compute_hash();
        events.push(recorded.clone());
        recorded
    }

    /// Replace the log with events loaded from the database, ordered by sequence.
    pub fn restore(&self, mut loaded: Vec<AuditEvent>) {
        loaded.sort_by_key(|e| e.sequence);
        *self.events.lock() = loaded;
    }

    /// Append events another process wrote after our head. Only the event
    /// whose sequence is next in line is taken at each step, so re-reading
    /// an overlapping range is harmless. Returns how many were added.
    pub fn catch_up(&self, newer: Vec<AuditEvent>) -> usize {
        let mut events = self.events.lock();
        let mut added = 0;
        for event in newer {
            if event.sequence == events.len() as i64 {
                events.push(event);
                added += 1;
            }
        }
        added
    }

    /// Events touching one resource, oldest first.
    pub fn for_resource(&self, resource_type: &str, resource_id: &str) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.resource_type == resource_type && e.resource_id == resource_id)
            .cloned()
            .collect()
    }

    /// Events with the given action, oldest first.
    pub fn with_action(&self, action: AuditAction) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.action == action.as_str())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Check that every event links to its predecessor and that its own
    /// hash matches its content.
    pub fn verify(&self) -> ChainIntegrity {
        let events = self.events.lock();
        let mut broken_links = 0;
        let mut expected_prev = GENESIS_HASH;
        for event in events.iter() {
            if event.previous_hash != expected_prev || event.event_hash != event.compute_hash() {
                broken_links += 1;
            }
            expected_prev = &event.event_hash;
        }
        ChainIntegrity {
            total_events: events.len(),
            broken_links,
            chain_valid: broken_links == 0,
        }
    }
}

/// Compute SHA-256 hex digest of input string.
fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    result.iter().map(|b| format!("{b:02x}")).collect()
}
