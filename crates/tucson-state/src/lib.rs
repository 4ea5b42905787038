//! # tucson-state: Verification Lifecycle
//!
//! ## Modules
//!
//! - **Verification** (`verification.rs`): the review state machine
//!   (`PENDING → IN_REVIEW → APPROVED / REJECTED / RESUBMISSION_REQUIRED`,
//!   with `EXPIRED` reachable from any non-terminal state), validated review
//!   decisions, and the submission payload.
//!
//! - **Wizard** (`wizard.rs`): the four-step submission form with per-step
//!   gating, shared by the typed client and its tests.
//!
//! ## Design
//!
//! Status is a closed enum and [`verification::transition`] is the single
//! transition table. Records carry an ordered transition log so every
//! status change is attributable.

pub mod verification;
pub mod wizard;

// ─── Verification re-exports ────────────────────────────────────────

pub use verification::{
    transition, FinancialClaim, ReviewDecision, SubmissionFields, TransitionError,
    TransitionRecord, Verification, VerificationEvent, VerificationStatus,
    VerificationSubmission, APPROVAL_VALIDITY_DAYS, UNDECIDED_TIMEOUT_DAYS,
};

// ─── Wizard re-exports ──────────────────────────────────────────────

pub use wizard::{
    DocumentEntry, FileAttachment, RejectedFile, Step, StepStatus, SubmissionPlan,
    VerificationWizard,
};
