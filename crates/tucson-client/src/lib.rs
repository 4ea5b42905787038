//! # tucson-client: Typed Tucson API Client
//!
//! Used by investor and admin front ends, scripts, and the end-to-end
//! tests.
//!
//! ## Modules
//!
//! - **Client** (`client.rs`): one async method per API endpoint over
//!   `reqwest`, bearer token per request, no retries.
//! - **Session** (`session.rs`): the [`TokenProvider`] seam and
//!   [`Session`], which owns the profile cache and clears it on sign-out.
//! - **Profile cache** (`profile_cache.rs`): single-flight, short-TTL
//!   cache of the signed-in profile.
//! - **Submission** (`submission.rs`): validates a
//!   [`tucson_state::VerificationWizard`] locally, then submits and uploads;
//!   a failed upload can be retried alone.
//! - **Admin** (`admin.rs`): review and user management gated by the shared
//!   authorization policy, with confirmation for deletes.
//!
//! Every failure is a [`ClientError`] with a user-displayable message.

pub mod admin;
pub mod client;
pub mod error;
pub mod profile_cache;
pub mod session;
pub mod submission;
pub mod types;

pub use admin::{AdminConsole, AlwaysConfirm, Confirm};
pub use client::TucsonClient;
pub use error::{ClientError, GENERIC_FAILURE};
pub use profile_cache::{ProfileCache, PROFILE_TTL};
pub use session::{Session, StaticToken, TokenProvider};
pub use submission::{retry_upload, submit, SubmitError, Submitted, SUBMIT_FALLBACK, UPLOAD_FALLBACK};
pub use types::*;
