//! # Validation Errors
//!
//! Structured validation failures built with `thiserror`. The `Display`
//! output of each variant is the message shown to the user, so the wizard,
//! the API, and the client all report identical text for the same rule.

use thiserror::Error;

/// A business-rule violation detected before any state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No verification method was chosen in step 1.
    #[error("Please select a verification method")]
    MissingVerificationType,

    /// The chosen method exists in the data model but cannot be submitted.
    #[error("This verification method is not yet supported")]
    UnsupportedVerificationType,

    /// Annual income is absent or below the qualification threshold.
    #[error("Annual income must be at least $200,000 to qualify as an accredited investor")]
    IncomeBelowThreshold,

    /// Income source is empty for an INCOME verification.
    #[error("Please specify your source of income")]
    MissingIncomeSource,

    /// Net worth is absent or below the qualification threshold.
    #[error("Net worth must be at least $1,000,000 to qualify as an accredited investor")]
    NetWorthBelowThreshold,

    /// Step 3 was attempted with no files attached.
    #[error("Please upload at least one supporting document")]
    NoDocuments,

    /// At least one attached file has no document type.
    #[error("Please select a document type for every uploaded file")]
    MissingDocumentType,

    /// Attestation or consent checkbox is unchecked.
    #[error("You must confirm the attestation and consent to verification before submitting")]
    ConsentRequired,

    /// File MIME type is not one of PDF, JPEG, PNG.
    #[error("unsupported file type \"{0}\" (accepted: PDF, JPEG, PNG)")]
    UnsupportedMimeType(String),

    /// File exceeds the 10 MB upload limit.
    #[error("file \"{file_name}\" is {size} bytes; the maximum is 10 MB")]
    FileTooLarge {
        /// Name of the rejected file.
        file_name: String,
        /// Size of the rejected file in bytes.
        size: u64,
    },

    /// A required text field is empty.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// Email address is syntactically invalid.
    #[error("invalid email address: \"{0}\"")]
    InvalidEmail(String),

    /// A monetary amount could not be parsed.
    #[error("invalid amount: \"{0}\"")]
    InvalidAmount(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_worth_message_matches_inline_copy() {
        let msg = ValidationError::NetWorthBelowThreshold.to_string();
        assert!(msg.starts_with("Net worth must be at least $1,000,000"));
    }

    #[test]
    fn income_message_names_threshold() {
        let msg = ValidationError::IncomeBelowThreshold.to_string();
        assert!(msg.contains("$200,000"));
    }

    #[test]
    fn file_too_large_carries_context() {
        let err = ValidationError::FileTooLarge {
            file_name: "scan.pdf".to_string(),
            size: 11_000_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("scan.pdf"));
        assert!(msg.contains("11000000"));
    }

    #[test]
    fn empty_field_names_field() {
        assert_eq!(
            ValidationError::EmptyField("email").to_string(),
            "email must not be empty"
        );
    }
}
