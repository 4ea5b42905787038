//! # API Route Modules
//!
//! - `health`: unauthenticated health check with database status.
//! - `verification`: an investor's own accreditation status, submission,
//!   and document upload.
//! - `admin_verifications`: review console (list, stats, detail, single
//!   and batch review, document fetch, scan results).
//! - `admin_users`: user management (list, invite, edit, role change,
//!   delete, identity-provider sync).
//! - `users`: the caller's own profile and preferences.

pub mod admin_users;
pub mod admin_verifications;
pub mod health;
pub mod users;
pub mod verification;

use serde::{Deserialize, Serialize};

/// Success wrapper used by mutating endpoints: `{"success": true, "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Case-insensitive substring match used by the list filters.
pub(crate) fn matches_search(needle: &str, haystacks: &[&str]) -> bool {
    let needle = needle.to_lowercase();
    haystacks.iter().any(|h| h.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_success_flag() {
        let json = serde_json::to_value(Envelope::ok(42)).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 42}));
    }

    #[test]
    fn search_is_case_insensitive() {
        assert!(matches_search("ADA", &["ada@example.com"]));
        assert!(matches_search("love", &["x", "Lovelace"]));
        assert!(!matches_search("grace", &["ada@example.com", "Lovelace"]));
    }
}
