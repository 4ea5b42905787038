//! # Supporting Documents
//!
//! Metadata for files attached to a verification. The binary content lives
//! in an external blob store; only metadata is modelled here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum accepted upload size: 10 MB.
pub const MAX_DOCUMENT_SIZE: u64 = 10 * 1024 * 1024;

/// MIME types accepted for upload.
pub const ACCEPTED_MIME_TYPES: [&str; 3] = ["application/pdf", "image/jpeg", "image/png"];

/// Whether `mime_type` is one of [`ACCEPTED_MIME_TYPES`].
pub fn is_accepted_mime_type(mime_type: &str) -> bool {
    ACCEPTED_MIME_TYPES.contains(&mime_type.trim().to_ascii_lowercase().as_str())
}

/// Check MIME type and size limits for a single file.
pub fn check_upload(file_name: &str, mime_type: &str, size: u64) -> Result<(), ValidationError> {
    if !is_accepted_mime_type(mime_type) {
        return Err(ValidationError::UnsupportedMimeType(mime_type.to_string()));
    }
    if size > MAX_DOCUMENT_SIZE {
        return Err(ValidationError::FileTooLarge {
            file_name: file_name.to_string(),
            size,
        });
    }
    Ok(())
}

/// Category of supporting evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    /// IRS Form W-2.
    W2,
    /// Filed tax return.
    TaxReturn,
    /// Recent pay stub.
    PayStub,
    /// Letter from employer.
    EmploymentLetter,
    /// Bank statement.
    BankStatement,
    /// Brokerage or investment statement.
    InvestmentStatement,
    /// Letter from a CPA.
    CpaLetter,
    /// Business valuation report.
    BusinessValuation,
    /// Anything else.
    Other,
}

impl DocumentType {
    /// Every document type, in display order.
    pub const ALL: [DocumentType; 9] = [
        Self::W2,
        Self::TaxReturn,
        Self::PayStub,
        Self::EmploymentLetter,
        Self::BankStatement,
        Self::InvestmentStatement,
        Self::CpaLetter,
        Self::BusinessValuation,
        Self::Other,
    ];

    /// Return the wire representation of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::W2 => "W2",
            Self::TaxReturn => "TAX_RETURN",
            Self::PayStub => "PAY_STUB",
            Self::EmploymentLetter => "EMPLOYMENT_LETTER",
            Self::BankStatement => "BANK_STATEMENT",
            Self::InvestmentStatement => "INVESTMENT_STATEMENT",
            Self::CpaLetter => "CPA_LETTER",
            Self::BusinessValuation => "BUSINESS_VALUATION",
            Self::Other => "OTHER",
        }
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown document type: {s}"))
    }
}

/// Result of the external virus scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    /// Not yet scanned.
    Pending,
    /// Scanned, no threat found.
    Clean,
    /// Scanned, threat found. Content must not be served.
    Infected,
    /// Scanner could not decide.
    Unknown,
}

impl ScanStatus {
    /// Return the wire representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Clean => "CLEAN",
            Self::Infected => "INFECTED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::str::FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CLEAN" => Ok(Self::Clean),
            "INFECTED" => Ok(Self::Infected),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(format!("unknown scan status: {other}")),
        }
    }
}

/// Metadata of an uploaded document.
///
/// Immutable after upload except for `virus_scan_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document identifier.
    pub id: Uuid,
    /// Category of evidence.
    pub document_type: DocumentType,
    /// Original file name.
    pub file_name: String,
    /// Size in bytes.
    pub file_size: u64,
    /// MIME type as uploaded.
    pub mime_type: String,
    /// Virus scan result.
    pub virus_scan_status: ScanStatus,
    /// Upload time.
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    /// Blob-store key under which this document's bytes are kept.
    pub fn storage_key(&self, verification_id: Uuid) -> String {
        format!("verifications/{verification_id}/{}", self.id)
    }
}
