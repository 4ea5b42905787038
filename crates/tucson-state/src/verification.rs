//! # Verification Review State Machine
//!
//! Models the lifecycle of an accredited-investor verification request from
//! submission through an admin decision or expiry.
//!
//! ## States
//!
//! ```text
//! PENDING ──start_review──▶ IN_REVIEW
//!    │                          │
//!    ├──approve─────────────────┼──▶ APPROVED (terminal)
//!    ├──reject(reason)──────────┼──▶ REJECTED (terminal)
//!    └──request_resubmission────┴──▶ RESUBMISSION_REQUIRED ──resubmit──▶ PENDING
//!
//! (any non-terminal) ──expire──▶ EXPIRED (terminal)
//! ```
//!
//! [`transition`] is the only place the table lives. Every mutating method
//! on [`Verification`] goes through it and appends a [`TransitionRecord`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use tucson_core::accreditation::{check_income, check_net_worth};
use tucson_core::{Amount, Document, ScanStatus, ValidationError, VerificationType};

/// Days an approval remains valid.
pub const APPROVAL_VALIDITY_DAYS: i64 = 90;

/// Days an undecided request may remain open before it expires.
pub const UNDECIDED_TIMEOUT_DAYS: i64 = 180;

// ─── Status ──────────────────────────────────────────────────────────

/// The lifecycle status of a verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    /// Submitted, awaiting an admin.
    Pending,
    /// An admin has started reviewing.
    InReview,
    /// Accredited (terminal).
    Approved,
    /// Not accredited (terminal).
    Rejected,
    /// The owner must correct and resubmit.
    ResubmissionRequired,
    /// Timed out (terminal).
    Expired,
}

impl VerificationStatus {
    /// Every status, in display order.
    pub const ALL: [VerificationStatus; 6] = [
        Self::Pending,
        Self::InReview,
        Self::Approved,
        Self::Rejected,
        Self::ResubmissionRequired,
        Self::Expired,
    ];

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Expired)
    }

    /// Whether an admin still owes a decision.
    pub fn awaits_decision(&self) -> bool {
        matches!(self, Self::Pending | Self::InReview)
    }

    /// Return the wire representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InReview => "IN_REVIEW",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::ResubmissionRequired => "RESUBMISSION_REQUIRED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown verification status: {s}"))
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors that can occur during verification lifecycle transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The verification is already decided or expired.
    #[error("verification is in terminal state {state}")]
    Terminal {
        /// The terminal state.
        state: VerificationStatus,
    },

    /// The event is not valid from the current state.
    #[error("invalid verification transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: VerificationStatus,
        /// Attempted target state.
        to: VerificationStatus,
    },

    /// REJECTED requires a rejection reason.
    #[error("A rejection reason is required when rejecting a verification")]
    MissingRejectionReason,

    /// RESUBMISSION_REQUIRED requires notes telling the owner what to fix.
    #[error("Notes are required when requesting resubmission")]
    MissingResubmissionNotes,

    /// The requested status cannot be reached by a review.
    #[error("status {0} is not a valid review outcome")]
    UnsupportedTarget(VerificationStatus),
}

// ─── Events and the transition table ─────────────────────────────────

/// Something that happens to a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationEvent {
    /// An admin picks the request up.
    StartReview,
    /// An admin accredits the user.
    Approve,
    /// An admin declines the request.
    Reject,
    /// An admin sends the request back to the owner.
    RequestResubmission,
    /// The owner submits corrected details.
    Resubmit,
    /// The request timed out.
    Expire,
}

impl VerificationEvent {
    /// The state this event leads to when it is valid.
    pub fn target(&self) -> VerificationStatus {
        match self {
            Self::StartReview => VerificationStatus::InReview,
            Self::Approve => VerificationStatus::Approved,
            Self::Reject => VerificationStatus::Rejected,
            Self::RequestResubmission => VerificationStatus::ResubmissionRequired,
            Self::Resubmit => VerificationStatus::Pending,
            Self::Expire => VerificationStatus::Expired,
        }
    }
}

/// Apply `event` to `from`, returning the next status.
pub fn transition(
    from: VerificationStatus,
    event: VerificationEvent,
) -> Result<VerificationStatus, TransitionError> {
    use VerificationEvent as E;
    use VerificationStatus as S;

    if from.is_terminal() {
        return Err(TransitionError::Terminal { state: from });
    }
    match (from, event) {
        (S::Pending, E::StartReview)
        | (S::Pending | S::InReview, E::Approve | E::Reject | E::RequestResubmission)
        | (S::ResubmissionRequired, E::Resubmit)
        | (_, E::Expire) => Ok(event.target()),
        _ => Err(TransitionError::InvalidTransition {
            from,
            to: event.target(),
        }),
    }
}

// ─── Review decisions ────────────────────────────────────────────────

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A validated admin review action.
///
/// Construction through [`ReviewDecision::parse`] or
/// [`ReviewDecision::parse_batch`] guarantees the required free text is
/// present, so the check happens before any request leaves the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    /// Move to IN_REVIEW.
    StartReview {
        /// Optional internal notes.
        notes: Option<String>,
    },
    /// Accredit.
    Approve {
        /// Optional internal notes.
        notes: Option<String>,
    },
    /// Decline.
    Reject {
        /// Reason shown to the owner.
        reason: String,
        /// Optional internal notes.
        notes: Option<String>,
    },
    /// Send back to the owner.
    RequestResubmission {
        /// What the owner must correct.
        notes: String,
    },
}

impl ReviewDecision {
    /// Validate a single-review request.
    pub fn parse(
        target: VerificationStatus,
        notes: Option<String>,
        rejection_reason: Option<String>,
    ) -> Result<Self, TransitionError> {
        let notes = non_blank(notes);
        let rejection_reason = non_blank(rejection_reason);
        match target {
            VerificationStatus::InReview => Ok(Self::StartReview { notes }),
            VerificationStatus::Approved => Ok(Self::Approve { notes }),
            VerificationStatus::Rejected => match rejection_reason {
                Some(reason) => Ok(Self::Reject { reason, notes }),
                None => Err(TransitionError::MissingRejectionReason),
            },
            VerificationStatus::ResubmissionRequired => match notes {
                Some(notes) => Ok(Self::RequestResubmission { notes }),
                None => Err(TransitionError::MissingResubmissionNotes),
            },
            other => Err(TransitionError::UnsupportedTarget(other)),
        }
    }

    /// Validate a batch-review request.
    ///
    /// Only APPROVED and REJECTED are accepted. For REJECTED the reason is
    /// taken from `rejection_reason`, falling back to `notes`.
    pub fn parse_batch(
        target: VerificationStatus,
        notes: Option<String>,
        rejection_reason: Option<String>,
    ) -> Result<Self, TransitionError> {
        let notes = non_blank(notes);
        match target {
            VerificationStatus::Approved => Ok(Self::Approve { notes }),
            VerificationStatus::Rejected => {
                match non_blank(rejection_reason).or_else(|| notes.clone()) {
                    Some(reason) => Ok(Self::Reject { reason, notes }),
                    None => Err(TransitionError::MissingRejectionReason),
                }
            }
            other => Err(TransitionError::UnsupportedTarget(other)),
        }
    }

    /// The event this decision fires.
    pub fn event(&self) -> VerificationEvent {
        match self {
            Self::StartReview { .. } => VerificationEvent::StartReview,
            Self::Approve { .. } => VerificationEvent::Approve,
            Self::Reject { .. } => VerificationEvent::Reject,
            Self::RequestResubmission { .. } => VerificationEvent::RequestResubmission,
        }
    }

    /// The status this decision leads to.
    pub fn target(&self) -> VerificationStatus {
        self.event().target()
    }
}

// ─── Submission ──────────────────────────────────────────────────────

/// The financial figures backing a claim. Exactly one branch applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinancialClaim {
    /// INCOME verification.
    Income {
        /// Annual income in whole dollars.
        annual_income: Amount,
        /// Where the income comes from.
        income_source: String,
    },
    /// NET_WORTH verification.
    NetWorth {
        /// Net worth in whole dollars.
        net_worth: Amount,
        /// Liquid portion, if stated.
        liquid_net_worth: Option<Amount>,
    },
}

impl FinancialClaim {
    /// Build and validate a claim from loosely typed form fields.
    pub fn from_parts(
        verification_type: Option<VerificationType>,
        annual_income: Option<Amount>,
        income_source: Option<&str>,
        net_worth: Option<Amount>,
        liquid_net_worth: Option<Amount>,
    ) -> Result<Self, ValidationError> {
        match verification_type {
            None => Err(ValidationError::MissingVerificationType),
            Some(VerificationType::Income) => {
                let source = income_source.unwrap_or("").trim();
                check_income(annual_income.map(Amount::dollars), source)?;
                Ok(Self::Income {
                    annual_income: annual_income.unwrap_or(Amount(0)),
                    income_source: source.to_string(),
                })
            }
            Some(VerificationType::NetWorth) => {
                check_net_worth(net_worth.map(Amount::dollars))?;
                Ok(Self::NetWorth {
                    net_worth: net_worth.unwrap_or(Amount(0)),
                    liquid_net_worth,
                })
            }
            Some(_) => Err(ValidationError::UnsupportedVerificationType),
        }
    }

    /// The verification type this claim belongs to.
    pub fn verification_type(&self) -> VerificationType {
        match self {
            Self::Income { .. } => VerificationType::Income,
            Self::NetWorth { .. } => VerificationType::NetWorth,
        }
    }
}

/// Submission payload as it travels over the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFields {
    /// Chosen method.
    #[serde(default)]
    pub verification_type: Option<VerificationType>,
    /// INCOME only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_income: Option<Amount>,
    /// INCOME only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_source: Option<String>,
    /// NET_WORTH only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_worth: Option<Amount>,
    /// NET_WORTH only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquid_net_worth: Option<Amount>,
    /// The user attests the figures are accurate.
    #[serde(default)]
    pub attestation: bool,
    /// The user consents to third-party verification.
    #[serde(default)]
    pub consent_to_verify: bool,
}

impl SubmissionFields {
    /// Validate into a [`VerificationSubmission`].
    pub fn validate(self) -> Result<VerificationSubmission, ValidationError> {
        let claim = FinancialClaim::from_parts(
            self.verification_type,
            self.annual_income,
            self.income_source.as_deref(),
            self.net_worth,
            self.liquid_net_worth,
        )?;
        VerificationSubmission::new(claim, self.attestation, self.consent_to_verify)
    }
}

/// A submission that has passed every business rule.
///
/// The fields are private; [`VerificationSubmission::new`] is the only way
/// to obtain one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationSubmission {
    claim: FinancialClaim,
    attestation: bool,
    consent_to_verify: bool,
}

impl VerificationSubmission {
    /// Check attestation and consent and wrap an already-valid claim.
    pub fn new(
        claim: FinancialClaim,
        attestation: bool,
        consent_to_verify: bool,
    ) -> Result<Self, ValidationError> {
        if !(attestation && consent_to_verify) {
            return Err(ValidationError::ConsentRequired);
        }
        Ok(Self {
            claim,
            attestation,
            consent_to_verify,
        })
    }

    /// The financial claim.
    pub fn claim(&self) -> &FinancialClaim {
        &self.claim
    }

    /// Convert back into wire fields.
    pub fn to_fields(&self) -> SubmissionFields {
        let mut fields = SubmissionFields {
            verification_type: Some(self.claim.verification_type()),
            attestation: self.attestation,
            consent_to_verify: self.consent_to_verify,
            ..SubmissionFields::default()
        };
        match &self.claim {
            FinancialClaim::Income {
                annual_income,
                income_source,
            } => {
                fields.annual_income = Some(*annual_income);
                fields.income_source = Some(income_source.clone());
            }
            FinancialClaim::NetWorth {
                net_worth,
                liquid_net_worth,
            } => {
                fields.net_worth = Some(*net_worth);
                fields.liquid_net_worth = *liquid_net_worth;
            }
        }
        fields
    }
}

// ─── Verification record ─────────────────────────────────────────────

/// Record of a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    /// Status before.
    pub from_status: VerificationStatus,
    /// Status after.
    pub to_status: VerificationStatus,
    /// Acting user, `None` for system actions such as expiry.
    pub actor: Option<Uuid>,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

/// An accredited-investor verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    /// Request identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Claimed basis.
    pub verification_type: VerificationType,
    /// Current status.
    pub status: VerificationStatus,
    /// INCOME only.
    pub annual_income: Option<Amount>,
    /// INCOME only.
    pub income_source: Option<String>,
    /// NET_WORTH only.
    pub net_worth: Option<Amount>,
    /// NET_WORTH only.
    pub liquid_net_worth: Option<Amount>,
    /// Owner attested the figures.
    pub attestation: bool,
    /// Owner consented to verification.
    pub consent_to_verify: bool,
    /// When the current round was submitted.
    pub submitted_at: DateTime<Utc>,
    /// When a decision was recorded.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Who recorded the latest review action.
    pub reviewed_by: Option<Uuid>,
    /// Reviewer notes.
    pub review_notes: Option<String>,
    /// Reason shown on rejection.
    pub rejection_reason: Option<String>,
    /// When an approval lapses.
    pub expires_at: Option<DateTime<Utc>>,
    /// Uploaded supporting documents, in upload order.
    #[serde(default)]
    pub documents: Vec<Document>,
    /// Every status change, oldest first.
    #[serde(default)]
    pub transitions: Vec<TransitionRecord>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Verification {
    /// Create a PENDING request from a validated submission.
    pub fn submit(user_id: Uuid, submission: VerificationSubmission, now: DateTime<Utc>) -> Self {
        let mut verification = Self {
            id: Uuid::new_v4(),
            user_id,
            verification_type: submission.claim.verification_type(),
            status: VerificationStatus::Pending,
            annual_income: None,
            income_source: None,
            net_worth: None,
            liquid_net_worth: None,
            attestation: false,
            consent_to_verify: false,
            submitted_at: now,
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
            rejection_reason: None,
            expires_at: None,
            documents: Vec::new(),
            transitions: Vec::new(),
            updated_at: now,
        };
        verification.apply_submission(submission);
        verification
    }

    fn apply_submission(&mut self, submission: VerificationSubmission) {
        self.verification_type = submission.claim.verification_type();
        self.attestation = submission.attestation;
        self.consent_to_verify = submission.consent_to_verify;
        match submission.claim {
            FinancialClaim::Income {
                annual_income,
                income_source,
            } => {
                self.annual_income = Some(annual_income);
                self.income_source = Some(income_source);
                self.net_worth = None;
                self.liquid_net_worth = None;
            }
            FinancialClaim::NetWorth {
                net_worth,
                liquid_net_worth,
            } => {
                self.net_worth = Some(net_worth);
                self.liquid_net_worth = liquid_net_worth;
                self.annual_income = None;
                self.income_source = None;
            }
        }
    }

    /// Apply an admin review decision.
    pub fn review(
        &mut self,
        decision: ReviewDecision,
        reviewer: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let to = transition(self.status, decision.event())?;
        self.reviewed_by = Some(reviewer);
        match decision {
            ReviewDecision::StartReview { notes } => {
                if notes.is_some() {
                    self.review_notes = notes;
                }
            }
            ReviewDecision::Approve { notes } => {
                self.reviewed_at = Some(now);
                self.review_notes = notes;
                self.rejection_reason = None;
                self.expires_at = Some(now + Duration::days(APPROVAL_VALIDITY_DAYS));
            }
            ReviewDecision::Reject { reason, notes } => {
                self.reviewed_at = Some(now);
                self.review_notes = notes;
                self.rejection_reason = Some(reason);
            }
            ReviewDecision::RequestResubmission { notes } => {
                self.reviewed_at = Some(now);
                self.review_notes = Some(notes);
                self.rejection_reason = None;
            }
        }
        self.record(to, Some(reviewer), now);
        Ok(())
    }

    /// Replace the financial details after a resubmission request
    /// (RESUBMISSION_REQUIRED → PENDING). Documents are kept.
    pub fn resubmit(
        &mut self,
        submission: VerificationSubmission,
        actor: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let to = transition(self.status, VerificationEvent::Resubmit)?;
        self.apply_submission(submission);
        self.submitted_at = now;
        self.reviewed_at = None;
        self.reviewed_by = None;
        self.review_notes = None;
        self.rejection_reason = None;
        self.expires_at = None;
        self.record(to, Some(actor), now);
        Ok(())
    }

    /// Time the request out.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let to = transition(self.status, VerificationEvent::Expire)?;
        self.record(to, None, now);
        Ok(())
    }

    /// Whether the expiry sweep should expire this request at `now`.
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if self.expires_at.is_some_and(|at| at <= now) {
            return true;
        }
        self.submitted_at + Duration::days(UNDECIDED_TIMEOUT_DAYS) <= now
    }

    /// Whether this record currently grants accreditation.
    pub fn is_accredited(&self, now: DateTime<Utc>) -> bool {
        self.status == VerificationStatus::Approved && self.expires_at.map_or(true, |at| at > now)
    }

    /// Whether this record blocks its owner from opening a new request.
    pub fn blocks_new_submission(&self, now: DateTime<Utc>) -> bool {
        self.status.awaits_decision()
            || self.status == VerificationStatus::ResubmissionRequired
            || self.is_accredited(now)
    }

    /// Append an uploaded document.
    pub fn attach_document(&mut self, document: Document, now: DateTime<Utc>) {
        self.documents.push(document);
        self.updated_at = now;
    }

    /// Look up a document by id.
    pub fn document(&self, document_id: Uuid) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == document_id)
    }

    /// Record a virus-scan outcome. Returns `false` if no such document.
    pub fn set_scan_status(&mut self, document_id: Uuid, status: ScanStatus, now: DateTime<Utc>) -> bool {
        match self.documents.iter_mut().find(|d| d.id == document_id) {
            Some(doc) => {
                doc.virus_scan_status = status;
                self.updated_at = now;
                true
            }
            None => false,
        }
    }

    fn record(&mut self, to: VerificationStatus, actor: Option<Uuid>, now: DateTime<Utc>) {
        self.transitions.push(TransitionRecord {
            from_status: self.status,
            to_status: to,
            actor,
            timestamp: now,
        });
        self.status = to;
        self.updated_at = now;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
