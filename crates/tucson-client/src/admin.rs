//! # Admin console
//!
//! [`AdminConsole`] wraps the review and user-management endpoints for a
//! known actor. Every call is checked against [`tucson_core::can`] before
//! a request is built, and review decisions are validated with
//! [`ReviewDecision::parse`], so a refused or incomplete action costs no
//! round trip. The server repeats both checks.
//!
//! Deleting a user is irreversible and goes through a [`Confirm`] prompt
//! the caller supplies.

use async_trait::async_trait;
use tucson_core::{can, Action, Document, Role, ScanStatus, User};
use tucson_state::{ReviewDecision, Verification, VerificationStatus};
use uuid::Uuid;

use crate::client::TucsonClient;
use crate::error::ClientError;
use crate::session::Session;
use crate::types::*;

/// Asks the user to confirm a destructive action.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every prompt the same way.
#[derive(Debug, Clone, Copy)]
pub struct AlwaysConfirm(pub bool);

#[async_trait]
impl Confirm for AlwaysConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

pub struct AdminConsole {
    client: TucsonClient,
    actor: User,
}

impl AdminConsole {
    pub fn new(client: TucsonClient, actor: User) -> Self {
        Self { client, actor }
    }

    /// Console for the session's signed-in user.
    pub async fn for_session(session: &Session) -> Result<Self, ClientError> {
        let view = session.profile().await?;
        Ok(Self::new(session.client().clone(), view.user.clone()))
    }

    pub fn actor(&self) -> &User {
        &self.actor
    }

    /// Whether the actor may perform `action`, for showing or hiding
    /// controls.
    pub fn allows(&self, action: Action, target: Option<&User>) -> bool {
        can(&self.actor, action, target).is_allowed()
    }

    fn check(&self, action: Action, target: Option<&User>) -> Result<(), ClientError> {
        can(&self.actor, action, target).into_result()?;
        Ok(())
    }

    // -- Verifications --------------------------------------------------------

    pub async fn verifications(&self, filter: &VerificationFilter) -> Result<VerificationPage, ClientError> {
        self.check(Action::ReviewVerifications, None)?;
        self.client.list_verifications(filter).await
    }

    pub async fn stats(&self) -> Result<StatusCounts, ClientError> {
        self.check(Action::ReviewVerifications, None)?;
        self.client.verification_stats().await
    }

    pub async fn verification(&self, id: Uuid) -> Result<VerificationDetail, ClientError> {
        self.check(Action::ReviewVerifications, None)?;
        self.client.get_verification(id).await
    }

    /// Decide one verification.
    ///
    /// REJECTED needs a reason and RESUBMISSION_REQUIRED needs notes; a
    /// missing one fails here without a request.
    pub async fn review(
        &self,
        id: Uuid,
        target: VerificationStatus,
        notes: Option<String>,
        rejection_reason: Option<String>,
    ) -> Result<Verification, ClientError> {
        self.check(Action::ReviewVerifications, None)?;
        let decision = ReviewDecision::parse(target, notes, rejection_reason)?;
        self.client.review_verification(id, &decision).await
    }

    /// Approve or reject several verifications at once. Each id succeeds or
    /// fails on its own.
    pub async fn batch_review(
        &self,
        ids: &[Uuid],
        target: VerificationStatus,
        notes: Option<String>,
        rejection_reason: Option<String>,
    ) -> Result<BatchOutcome, ClientError> {
        self.check(Action::ReviewVerifications, None)?;
        let decision = ReviewDecision::parse_batch(target, notes, rejection_reason)?;
        self.client.batch_review(ids, &decision).await
    }

    pub async fn document(&self, verification_id: Uuid, document_id: Uuid) -> Result<DocumentContent, ClientError> {
        self.check(Action::ReviewVerifications, None)?;
        self.client.fetch_document(verification_id, document_id).await
    }

    pub async fn record_scan(
        &self,
        verification_id: Uuid,
        document_id: Uuid,
        status: ScanStatus,
    ) -> Result<Document, ClientError> {
        self.check(Action::RecordScanResult, None)?;
        self.client
            .record_scan(verification_id, document_id, status)
            .await
    }

    // -- Users ----------------------------------------------------------------

    pub async fn users(&self, filter: &UserFilter) -> Result<UserPage, ClientError> {
        self.check(Action::ViewUsers, None)?;
        self.client.list_users(filter).await
    }

    pub async fn user(&self, id: Uuid) -> Result<UserDetail, ClientError> {
        self.check(Action::ViewUsers, None)?;
        self.client.get_user(id).await
    }

    pub async fn invite(&self, invite: &Invite) -> Result<User, ClientError> {
        self.check(Action::InviteUser { role: invite.role }, None)?;
        self.client.invite_user(invite).await
    }

    /// Edit `target`. A role change in the same edit needs role-change
    /// rights too.
    pub async fn update_user(&self, target: &User, update: &UserUpdate) -> Result<User, ClientError> {
        self.check(Action::UpdateUser, Some(target))?;
        if update.role.is_some_and(|role| role != target.role) {
            self.check(Action::ChangeRole, Some(target))?;
        }
        self.client.update_user(target.id, update).await
    }

    pub async fn change_role(&self, target: &User, role: Role) -> Result<User, ClientError> {
        self.check(Action::ChangeRole, Some(target))?;
        self.client.change_role(target.id, role).await
    }

    /// Permanently delete `target` and their verifications, once `confirm`
    /// agrees.
    pub async fn delete_user(&self, target: &User, confirm: &dyn Confirm) -> Result<DeletedUser, ClientError> {
        self.check(Action::DeleteUser, Some(target))?;
        let prompt = format!(
            "Delete {} ({})? This cannot be undone.",
            target.full_name(),
            target.email
        );
        if !confirm.confirm(&prompt).await {
            tracing::debug!(user_id = %target.id, "user deletion cancelled");
            return Err(ClientError::Cancelled);
        }
        self.client.delete_user(target.id).await
    }

    pub async fn sync_users(&self) -> Result<SyncReport, ClientError> {
        self.check(Action::SyncUsers, None)?;
        self.client.sync_users().await
    }
}
