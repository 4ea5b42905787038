//! # tucson-cli: Operator Commands
//!
//! ## Subcommands
//!
//! - `tucson sync-users`: create local accounts for identity-provider users
//!   that do not have one yet, and link invited accounts to their provider id.
//! - `tucson expire-verifications`: expire overdue verification requests.
//!
//! Both read their configuration from the environment and print one line
//! per step.
//!
//! Both write to the database a running server also uses. The server reads
//! through to the database for callers it does not know, refuses to move a
//! stored verification out of a terminal status, and extends the audit
//! chain from the stored head, so either command is safe to run while the
//! server is up.

pub mod expire;
pub mod sync;
