//! # Authorization Policy
//!
//! [`can`] is the single authorization decision point. API handlers call it
//! before mutating anything; the client calls it to decide which controls
//! to offer. Both therefore agree on every rule.
//!
//! ## Rules
//!
//! | Action                  | Actor requirement                                 |
//! |-------------------------|---------------------------------------------------|
//! | any                     | actor status is ACTIVE                            |
//! | `SubmitVerification`    | none further                                      |
//! | `ViewOwnStatus`         | none further                                      |
//! | `ReviewVerifications`   | ADMIN or above                                    |
//! | `RecordScanResult`      | ADMIN or above                                    |
//! | `ViewUsers`             | ADMIN or above                                    |
//! | `InviteUser { role }`   | ADMIN or above; SUPER_ADMIN if `role` is ADMIN+   |
//! | `UpdateUser`            | ADMIN or above; SUPER_ADMIN if target is one      |
//! | `ChangeRole`            | SUPER_ADMIN, and target is not the actor          |
//! | `DeleteUser`            | ADMIN or above; not self; SUPER_ADMIN if target is |
//! | `SyncUsers`             | SUPER_ADMIN                                       |

use thiserror::Error;

use crate::user::{Role, User};

/// Something an actor may attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Submit or resubmit one's own verification.
    SubmitVerification,
    /// Read one's own accreditation status.
    ViewOwnStatus,
    /// List, read and decide verification requests, and fetch documents.
    ReviewVerifications,
    /// Record a virus-scan outcome for a document.
    RecordScanResult,
    /// List and read user accounts.
    ViewUsers,
    /// Invite a new user with the given role.
    InviteUser {
        /// Role the invited account will receive.
        role: Role,
    },
    /// Edit another user's demographic fields or status.
    UpdateUser,
    /// Change a user's role.
    ChangeRole,
    /// Permanently delete a user.
    DeleteUser,
    /// Pull users from the identity provider.
    SyncUsers,
}

/// Why an action was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Actor's account is not ACTIVE.
    #[error("account is not active")]
    InactiveAccount,

    /// Actor's role is below the requirement.
    #[error("role '{0}' required")]
    RequiresRole(Role),

    /// A user tried to change their own role.
    #[error("you cannot change your own role")]
    SelfRoleChange,

    /// A user tried to delete their own account.
    #[error("you cannot delete your own account")]
    SelfDelete,

    /// An ADMIN tried to modify a SUPER_ADMIN.
    #[error("role 'SUPER_ADMIN' required to modify a super admin")]
    ProtectedSuperAdmin,
}

/// Outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The action may proceed.
    Allow,
    /// The action is refused.
    Deny(DenyReason),
}

impl Decision {
    /// Whether the action may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Convert into a `Result` so callers can use `?`.
    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(reason),
        }
    }
}

fn require(actor: &User, role: Role) -> Result<(), DenyReason> {
    if actor.role >= role {
        Ok(())
    } else {
        Err(DenyReason::RequiresRole(role))
    }
}

fn protect_super_admin(actor: &User, target: Option<&User>) -> Result<(), DenyReason> {
    match target {
        Some(t) if t.role == Role::SuperAdmin && actor.role < Role::SuperAdmin => {
            Err(DenyReason::ProtectedSuperAdmin)
        }
        _ => Ok(()),
    }
}

fn is_self(actor: &User, target: Option<&User>) -> bool {
    target.is_some_and(|t| t.id == actor.id)
}

fn evaluate(actor: &User, action: Action, target: Option<&User>) -> Result<(), DenyReason> {
    if !actor.is_active() {
        return Err(DenyReason::InactiveAccount);
    }
    match action {
        Action::SubmitVerification | Action::ViewOwnStatus => Ok(()),
        Action::ReviewVerifications | Action::RecordScanResult | Action::ViewUsers => {
            require(actor, Role::Admin)
        }
        Action::InviteUser { role } => {
            require(actor, Role::Admin)?;
            if role.is_admin() {
                require(actor, Role::SuperAdmin)?;
            }
            Ok(())
        }
        Action::UpdateUser => {
            require(actor, Role::Admin)?;
            protect_super_admin(actor, target)
        }
        Action::ChangeRole => {
            require(actor, Role::SuperAdmin)?;
            if is_self(actor, target) {
                return Err(DenyReason::SelfRoleChange);
            }
            Ok(())
        }
        Action::DeleteUser => {
            require(actor, Role::Admin)?;
            if is_self(actor, target) {
                return Err(DenyReason::SelfDelete);
            }
            protect_super_admin(actor, target)
        }
        Action::SyncUsers => require(actor, Role::SuperAdmin),
    }
}

/// Decide whether `actor` may perform `action` on `target`.
///
/// `target` is the user being acted upon, if any. Actions that do not
/// concern another user ignore it.
pub fn can(actor: &User, action: Action, target: Option<&User>) -> Decision {
    match evaluate(actor, action, target) {
        Ok(()) => Decision::Allow,
        Err(reason) => Decision::Deny(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::UserStatus;

    fn user(role: Role) -> User {
        User::new(
            format!("{}@example.com", role.as_str().to_lowercase()),
            "Test".into(),
            "User".into(),
            role,
            UserStatus::Active,
        )
    }

    #[test]
    fn investor_may_submit_but_not_review() {
        let investor = user(Role::Investor);
        assert!(can(&investor, Action::SubmitVerification, None).is_allowed());
        assert_eq!(
            can(&investor, Action::ReviewVerifications, None),
            Decision::Deny(DenyReason::RequiresRole(Role::Admin))
        );
    }

    #[test]
    fn admin_cannot_change_roles() {
        let admin = user(Role::Admin);
        let target = user(Role::Investor);
        let decision = can(&admin, Action::ChangeRole, Some(&target));
        assert_eq!(decision, Decision::Deny(DenyReason::RequiresRole(Role::SuperAdmin)));
        assert_eq!(
            decision.into_result().unwrap_err().to_string(),
            "role 'SUPER_ADMIN' required"
        );
    }

    #[test]
    fn super_admin_cannot_change_own_role() {
        let sa = user(Role::SuperAdmin);
        assert_eq!(
            can(&sa, Action::ChangeRole, Some(&sa)),
            Decision::Deny(DenyReason::SelfRoleChange)
        );
        let other = user(Role::Admin);
        assert!(can(&sa, Action::ChangeRole, Some(&other)).is_allowed());
    }

    #[test]
    fn admin_cannot_touch_super_admin() {
        let admin = user(Role::Admin);
        let sa = user(Role::SuperAdmin);
        assert_eq!(
            can(&admin, Action::UpdateUser, Some(&sa)),
            Decision::Deny(DenyReason::ProtectedSuperAdmin)
        );
        assert_eq!(
            can(&admin, Action::DeleteUser, Some(&sa)),
            Decision::Deny(DenyReason::ProtectedSuperAdmin)
        );
        let investor = user(Role::Investor);
        assert!(can(&admin, Action::UpdateUser, Some(&investor)).is_allowed());
        assert!(can(&admin, Action::DeleteUser, Some(&investor)).is_allowed());
    }

    #[test]
    fn nobody_deletes_themselves() {
        let sa = user(Role::SuperAdmin);
        assert_eq!(
            can(&sa, Action::DeleteUser, Some(&sa)),
            Decision::Deny(DenyReason::SelfDelete)
        );
    }

    #[test]
    fn inviting_admins_requires_super_admin() {
        let admin = user(Role::Admin);
        assert!(can(&admin, Action::InviteUser { role: Role::Investor }, None).is_allowed());
        assert_eq!(
            can(&admin, Action::InviteUser { role: Role::Admin }, None),
            Decision::Deny(DenyReason::RequiresRole(Role::SuperAdmin))
        );
        let sa = user(Role::SuperAdmin);
        assert!(can(&sa, Action::InviteUser { role: Role::SuperAdmin }, None).is_allowed());
    }

    #[test]
    fn sync_requires_super_admin() {
        assert!(!can(&user(Role::Admin), Action::SyncUsers, None).is_allowed());
        assert!(can(&user(Role::SuperAdmin), Action::SyncUsers, None).is_allowed());
    }

    #[test]
    fn suspended_actor_is_denied_everything() {
        let mut sa = user(Role::SuperAdmin);
        sa.status = UserStatus::Suspended;
        assert_eq!(
            can(&sa, Action::ReviewVerifications, None),
            Decision::Deny(DenyReason::InactiveAccount)
        );
        assert_eq!(
            can(&sa, Action::SubmitVerification, None),
            Decision::Deny(DenyReason::InactiveAccount)
        );
    }
}
