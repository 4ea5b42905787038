//! # Verification Submission Wizard
//!
//! Four steps, each gated by its own validation:
//!
//! 1. Choose Method
//! 2. Financial Details
//! 3. Document Upload
//! 4. Review & Submit
//!
//! `next` advances only when the current step validates and leaves all
//! state untouched otherwise. `back` always succeeds. Amounts are stored as
//! canonical digit strings and formatted on read.

use tucson_core::currency::{format_input, normalize_input, parse_currency};
use tucson_core::document::check_upload;
use tucson_core::{Amount, DocumentType, ValidationError, VerificationType};

use crate::verification::{FinancialClaim, VerificationSubmission};

/// A wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    /// Pick INCOME or NET_WORTH.
    ChooseMethod = 1,
    /// Enter figures.
    FinancialDetails = 2,
    /// Attach evidence.
    DocumentUpload = 3,
    /// Attest, consent, submit.
    ReviewSubmit = 4,
}

impl Step {
    /// All steps in order.
    pub const ALL: [Step; 4] = [
        Self::ChooseMethod,
        Self::FinancialDetails,
        Self::DocumentUpload,
        Self::ReviewSubmit,
    ];

    /// 1-based step number.
    pub fn number(self) -> u8 {
        self as u8
    }

    fn next(self) -> Self {
        match self {
            Self::ChooseMethod => Self::FinancialDetails,
            Self::FinancialDetails => Self::DocumentUpload,
            Self::DocumentUpload | Self::ReviewSubmit => Self::ReviewSubmit,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::ChooseMethod | Self::FinancialDetails => Self::ChooseMethod,
            Self::DocumentUpload => Self::FinancialDetails,
            Self::ReviewSubmit => Self::DocumentUpload,
        }
    }
}

/// Progress-indicator status of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Not reached yet.
    Pending,
    /// Currently shown.
    Active,
    /// Passed.
    Completed,
}

/// A file selected by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct FileAttachment {
    /// Original file name.
    pub file_name: String,
    /// MIME type reported by the browser or file picker.
    pub mime_type: String,
    /// File content.
    pub bytes: Vec<u8>,
}

impl FileAttachment {
    /// Construct an attachment.
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl std::fmt::Debug for FileAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAttachment")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// One attached file with its (possibly unset) document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    /// The file.
    pub file: FileAttachment,
    /// Category chosen by the user.
    pub document_type: Option<DocumentType>,
}

/// A file refused by [`VerificationWizard::add_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    /// Name of the refused file.
    pub file_name: String,
    /// Why it was refused.
    pub error: ValidationError,
}

/// Everything needed to submit: the validated payload plus typed files.
#[derive(Debug, Clone)]
pub struct SubmissionPlan {
    /// Validated fields.
    pub submission: VerificationSubmission,
    /// Files to upload, in order.
    pub documents: Vec<(FileAttachment, DocumentType)>,
}

/// State of the four-step submission form.
#[derive(Debug, Clone)]
pub struct VerificationWizard {
    step: Step,
    verification_type: Option<VerificationType>,
    annual_income: String,
    income_source: String,
    net_worth: String,
    liquid_net_worth: String,
    documents: Vec<DocumentEntry>,
    attestation: bool,
    consent_to_verify: bool,
}

impl Default for VerificationWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationWizard {
    /// A blank wizard on step 1.
    pub fn new() -> Self {
        Self {
            step: Step::ChooseMethod,
            verification_type: None,
            annual_income: String::new(),
            income_source: String::new(),
            net_worth: String::new(),
            liquid_net_worth: String::new(),
            documents: Vec::new(),
            attestation: false,
            consent_to_verify: false,
        }
    }

    /// Current step.
    pub fn step(&self) -> Step {
        self.step
    }

    /// Progress-indicator status of `step`.
    pub fn step_status(&self, step: Step) -> StepStatus {
        match step.cmp(&self.step) {
            std::cmp::Ordering::Less => StepStatus::Completed,
            std::cmp::Ordering::Equal => StepStatus::Active,
            std::cmp::Ordering::Greater => StepStatus::Pending,
        }
    }

    // ── Step 1 ───────────────────────────────────────────────────────

    /// Choose a verification method.
    pub fn select_method(&mut self, verification_type: VerificationType) {
        self.verification_type = Some(verification_type);
    }

    /// Chosen method, if any.
    pub fn verification_type(&self) -> Option<VerificationType> {
        self.verification_type
    }

    // ── Step 2 ───────────────────────────────────────────────────────

    /// Set annual income from free text.
    pub fn set_annual_income(&mut self, input: &str) {
        self.annual_income = normalize_input(input);
    }

    /// Annual income formatted for the input field.
    pub fn annual_income(&self) -> String {
        format_input(&self.annual_income)
    }

    /// Set income source.
    pub fn set_income_source(&mut self, source: &str) {
        self.income_source = source.to_string();
    }

    /// Income source as entered.
    pub fn income_source(&self) -> &str {
        &self.income_source
    }

    /// Set net worth from free text.
    pub fn set_net_worth(&mut self, input: &str) {
        self.net_worth = normalize_input(input);
    }

    /// Net worth formatted for the input field.
    pub fn net_worth(&self) -> String {
        format_input(&self.net_worth)
    }

    /// Set liquid net worth from free text.
    pub fn set_liquid_net_worth(&mut self, input: &str) {
        self.liquid_net_worth = normalize_input(input);
    }

    /// Liquid net worth formatted for the input field.
    pub fn liquid_net_worth(&self) -> String {
        format_input(&self.liquid_net_worth)
    }

    // ── Step 3 ───────────────────────────────────────────────────────

    /// Append dropped or picked files with an unset document type.
    ///
    /// Files with an unaccepted MIME type or over the size limit are left
    /// out and returned.
    pub fn add_files(&mut self, files: impl IntoIterator<Item = FileAttachment>) -> Vec<RejectedFile> {
        let mut rejected = Vec::new();
        for file in files {
            match check_upload(&file.file_name, &file.mime_type, file.size()) {
                Ok(()) => self.documents.push(DocumentEntry {
                    file,
                    document_type: None,
                }),
                Err(error) => rejected.push(RejectedFile {
                    file_name: file.file_name,
                    error,
                }),
            }
        }
        rejected
    }

    /// Set the document type of the entry at `index`. Returns `false` if
    /// there is no such entry.
    pub fn set_document_type(&mut self, index: usize, document_type: DocumentType) -> bool {
        match self.documents.get_mut(index) {
            Some(entry) => {
                entry.document_type = Some(document_type);
                true
            }
            None => false,
        }
    }

    /// Remove the entry at `index`.
    pub fn remove_document(&mut self, index: usize) -> Option<DocumentEntry> {
        (index < self.documents.len()).then(|| self.documents.remove(index))
    }

    /// Attached files in order.
    pub fn documents(&self) -> &[DocumentEntry] {
        &self.documents
    }

    // ── Step 4 ───────────────────────────────────────────────────────

    /// Tick or untick the attestation checkbox.
    pub fn set_attestation(&mut self, value: bool) {
        self.attestation = value;
    }

    /// Tick or untick the consent checkbox.
    pub fn set_consent(&mut self, value: bool) {
        self.consent_to_verify = value;
    }

    // ── Navigation ───────────────────────────────────────────────────

    fn claim(&self) -> Result<FinancialClaim, ValidationError> {
        let amount = |digits: &str| parse_currency(digits).map(Amount);
        FinancialClaim::from_parts(
            self.verification_type,
            amount(&self.annual_income),
            Some(&self.income_source),
            amount(&self.net_worth),
            amount(&self.liquid_net_worth),
        )
    }

    /// Validate a single step.
    pub fn validate_step(&self, step: Step) -> Result<(), ValidationError> {
        match step {
            Step::ChooseMethod => self
                .verification_type
                .map(|_| ())
                .ok_or(ValidationError::MissingVerificationType),
            Step::FinancialDetails => self.claim().map(|_| ()),
            Step::DocumentUpload => {
                if self.documents.is_empty() {
                    Err(ValidationError::NoDocuments)
                } else if self.documents.iter().any(|d| d.document_type.is_none()) {
                    Err(ValidationError::MissingDocumentType)
                } else {
                    Ok(())
                }
            }
            Step::ReviewSubmit => {
                if self.attestation && self.consent_to_verify {
                    Ok(())
                } else {
                    Err(ValidationError::ConsentRequired)
                }
            }
        }
    }

    /// Advance if the current step validates. On the last step this only
    /// validates.
    pub fn next(&mut self) -> Result<Step, ValidationError> {
        self.validate_step(self.step)?;
        self.step = self.step.next();
        Ok(self.step)
    }

    /// Go back one step without validating.
    pub fn back(&mut self) -> Step {
        self.step = self.step.prev();
        self.step
    }

    /// Validate every step and assemble what the submit call needs.
    pub fn prepare_submission(&self) -> Result<SubmissionPlan, ValidationError> {
        for step in Step::ALL {
            self.validate_step(step)?;
        }
        let submission =
            VerificationSubmission::new(self.claim()?, self.attestation, self.consent_to_verify)?;
        let documents = self
            .documents
            .iter()
            .filter_map(|d| d.document_type.map(|t| (d.file.clone(), t)))
            .collect();
        Ok(SubmissionPlan {
            submission,
            documents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tucson_core::document::MAX_DOCUMENT_SIZE;

    fn pdf(name: &str) -> FileAttachment {
        FileAttachment::new(name, "application/pdf", b"%PDF-1.4".to_vec())
    }

    fn completed_income_wizard() -> VerificationWizard {
        let mut w = VerificationWizard::new();
        w.select_method(VerificationType::Income);
        w.next().unwrap();
        w.set_annual_income("250000");
        w.set_income_source("Salary");
        w.next().unwrap();
        w.add_files([pdf("w2.pdf")]);
        w.set_document_type(0, DocumentType::W2);
        w.next().unwrap();
        w.set_attestation(true);
        w.set_consent(true);
        w
    }

    #[test]
    fn step_one_requires_method() {
        let mut w = VerificationWizard::new();
        assert_eq!(w.next(), Err(ValidationError::MissingVerificationType));
        assert_eq!(w.step(), Step::ChooseMethod);
        assert_eq!(w.step_status(Step::ChooseMethod), StepStatus::Active);
        assert_eq!(w.step_status(Step::FinancialDetails), StepStatus::Pending);
    }

    #[test]
    fn income_boundary_gates_step_two() {
        let mut w = VerificationWizard::new();
        w.select_method(VerificationType::Income);
        w.next().unwrap();
        w.set_income_source("Salary");
        w.set_annual_income("199,999");
        assert_eq!(w.next(), Err(ValidationError::IncomeBelowThreshold));
        assert_eq!(w.step(), Step::FinancialDetails);
        w.set_annual_income("200000");
        assert_eq!(w.next(), Ok(Step::DocumentUpload));
        assert_eq!(w.step_status(Step::ChooseMethod), StepStatus::Completed);
    }

    #[test]
    fn income_requires_source() {
        let mut w = VerificationWizard::new();
        w.select_method(VerificationType::Income);
        w.set_annual_income("300000");
        assert_eq!(
            w.validate_step(Step::FinancialDetails),
            Err(ValidationError::MissingIncomeSource)
        );
    }

    #[test]
    fn net_worth_boundary() {
        let mut w = VerificationWizard::new();
        w.select_method(VerificationType::NetWorth);
        w.set_net_worth("999999");
        assert_eq!(
            w.validate_step(Step::FinancialDetails),
            Err(ValidationError::NetWorthBelowThreshold)
        );
        w.set_net_worth("$1,000,000");
        assert_eq!(w.validate_step(Step::FinancialDetails), Ok(()));
        assert_eq!(w.net_worth(), "1,000,000");
    }

    #[test]
    fn unsupported_method_blocks_step_two() {
        let mut w = VerificationWizard::new();
        w.select_method(VerificationType::Entity);
        assert_eq!(w.next(), Ok(Step::FinancialDetails));
        assert_eq!(w.next(), Err(ValidationError::UnsupportedVerificationType));
    }

    #[test]
    fn step_three_needs_typed_documents() {
        let mut w = VerificationWizard::new();
        assert_eq!(
            w.validate_step(Step::DocumentUpload),
            Err(ValidationError::NoDocuments)
        );
        w.add_files([pdf("a.pdf"), pdf("b.pdf")]);
        w.set_document_type(0, DocumentType::TaxReturn);
        assert_eq!(
            w.validate_step(Step::DocumentUpload),
            Err(ValidationError::MissingDocumentType)
        );
        assert!(w.set_document_type(1, DocumentType::PayStub));
        assert_eq!(w.validate_step(Step::DocumentUpload), Ok(()));
        assert!(!w.set_document_type(5, DocumentType::Other));
    }

    #[test]
    fn add_files_filters_type_and_size() {
        let mut w = VerificationWizard::new();
        let big = FileAttachment::new(
            "huge.pdf",
            "application/pdf",
            vec![0; MAX_DOCUMENT_SIZE as usize + 1],
        );
        let gif = FileAttachment::new("cat.gif", "image/gif", vec![1, 2, 3]);
        let rejected = w.add_files([pdf("ok.pdf"), big, gif]);
        assert_eq!(w.documents().len(), 1);
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].file_name, "huge.pdf");
        assert!(matches!(rejected[1].error, ValidationError::UnsupportedMimeType(_)));
    }

    #[test]
    fn additional_files_append_untyped() {
        let mut w = VerificationWizard::new();
        w.add_files([pdf("a.pdf")]);
        w.set_document_type(0, DocumentType::W2);
        w.add_files([pdf("b.pdf")]);
        assert_eq!(w.documents()[0].document_type, Some(DocumentType::W2));
        assert_eq!(w.documents()[1].document_type, None);
        let removed = w.remove_document(0).unwrap();
        assert_eq!(removed.file.file_name, "a.pdf");
        assert!(w.remove_document(3).is_none());
    }

    #[test]
    fn step_four_requires_both_checkboxes() {
        let mut w = completed_income_wizard();
        w.set_consent(false);
        assert_eq!(w.next(), Err(ValidationError::ConsentRequired));
        w.set_consent(true);
        assert_eq!(w.next(), Ok(Step::ReviewSubmit));
    }

    #[test]
    fn back_never_validates() {
        let mut w = completed_income_wizard();
        w.set_attestation(false);
        assert_eq!(w.back(), Step::DocumentUpload);
        assert_eq!(w.back(), Step::FinancialDetails);
        assert_eq!(w.back(), Step::ChooseMethod);
        assert_eq!(w.back(), Step::ChooseMethod);
        assert_eq!(w.annual_income(), "250,000");
    }

    #[test]
    fn prepare_submission_collects_typed_files() {
        let w = completed_income_wizard();
        let plan = w.prepare_submission().unwrap();
        assert_eq!(plan.documents.len(), 1);
        assert_eq!(plan.documents[0].1, DocumentType::W2);
        let fields = plan.submission.to_fields();
        assert_eq!(fields.annual_income, Some(Amount(250_000)));
        assert_eq!(fields.income_source.as_deref(), Some("Salary"));
    }

    #[test]
    fn blocked_net_worth_submission_reports_threshold_message() {
        let mut w = VerificationWizard::new();
        w.select_method(VerificationType::NetWorth);
        w.set_net_worth("500000");
        let err = w.prepare_submission().unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Net worth must be at least $1,000,000"));
    }
}
