#![deny(missing_docs)]

//! # tucson-core: Foundational Types for Tucson
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies; it uses only `serde`, `serde_json`,
//! `thiserror`, `chrono`, `uuid`, and `utoipa` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Closed enums for every status.** Roles, user statuses, document
//!    types, and scan statuses are exhaustive enums serialized in
//!    `SCREAMING_SNAKE_CASE`. There are no string-typed statuses.
//!
//! 2. **One place for authorization.** [`policy::can`] is the single
//!    decision point consumed by API handlers and by client-side gating.
//!
//! 3. **One place for accreditation thresholds.** [`accreditation`] owns the
//!    income and net-worth qualification rules; the wizard and the server
//!    both call into it.
//!
//! 4. **[`ValidationError`] carries the user-facing message.** Its `Display`
//!    output is what the UI shows inline, so server and client never drift.

pub mod accreditation;
pub mod currency;
pub mod document;
pub mod error;
pub mod pagination;
pub mod policy;
pub mod user;

// Re-export primary types at crate root for ergonomic imports.
pub use accreditation::{VerificationType, INCOME_THRESHOLD, NET_WORTH_THRESHOLD};
pub use currency::{format_currency, parse_currency, Amount};
pub use document::{Document, DocumentType, ScanStatus};
pub use error::ValidationError;
pub use pagination::{PageParams, Pagination};
pub use policy::{can, Action, Decision, DenyReason};
pub use user::{Profile, RiskTolerance, Role, User, UserStatus};
