//! # Accreditation Rules
//!
//! Qualification thresholds for accredited-investor status and the
//! verification methods a user may claim under.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ValidationError;

/// Minimum annual income (USD) for an INCOME verification.
pub const INCOME_THRESHOLD: u64 = 200_000;

/// Minimum net worth (USD) for a NET_WORTH verification.
pub const NET_WORTH_THRESHOLD: u64 = 1_000_000;

/// The basis on which a user claims accredited-investor status.
///
/// `Professional` and `Entity` exist in the data model but the submission
/// flow only accepts `Income` and `NetWorth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationType {
    /// Individual income of at least $200,000.
    Income,
    /// Net worth of at least $1,000,000.
    NetWorth,
    /// Professional certification.
    Professional,
    /// Qualifying entity.
    Entity,
}

impl VerificationType {
    /// Return the wire representation of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::NetWorth => "NET_WORTH",
            Self::Professional => "PROFESSIONAL",
            Self::Entity => "ENTITY",
        }
    }

    /// Whether the submission flow accepts this method.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Income | Self::NetWorth)
    }
}

impl std::fmt::Display for VerificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INCOME" => Ok(Self::Income),
            "NET_WORTH" => Ok(Self::NetWorth),
            "PROFESSIONAL" => Ok(Self::Professional),
            "ENTITY" => Ok(Self::Entity),
            other => Err(format!("unknown verification type: {other}")),
        }
    }
}

/// Check the INCOME qualification rule.
pub fn check_income(annual_income: Option<u64>, income_source: &str) -> Result<(), ValidationError> {
    match annual_income {
        Some(amount) if amount >= INCOME_THRESHOLD => {}
        _ => return Err(ValidationError::IncomeBelowThreshold),
    }
    if income_source.trim().is_empty() {
        return Err(ValidationError::MissingIncomeSource);
    }
    Ok(())
}

/// Check the NET_WORTH qualification rule.
pub fn check_net_worth(net_worth: Option<u64>) -> Result<(), ValidationError> {
    match net_worth {
        Some(amount) if amount >= NET_WORTH_THRESHOLD => Ok(()),
        _ => Err(ValidationError::NetWorthBelowThreshold),
    }
}
