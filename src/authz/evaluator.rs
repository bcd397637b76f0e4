use super::principal::Principal;
use super::{Denial, Operation};
use crate::models::project::{MemberRole, Project};

/// Policy evaluator trait for pluggable project authorization
pub trait PolicyEvaluator: Send + Sync {
    /// Decide whether the principal may perform `operation` on `project`.
    fn evaluate(&self, principal: Option<&Principal>, project: &Project, operation: Operation) -> Result<(), Denial>;
}

/// Default evaluator: the ordered procedure in [`evaluate`].
#[derive(Debug, Clone, Default)]
pub struct ProjectPolicy;

impl ProjectPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyEvaluator for ProjectPolicy {
    fn evaluate(&self, principal: Option<&Principal>, project: &Project, operation: Operation) -> Result<(), Denial> {
        let decision = evaluate(principal, project, operation);

        match (&decision, principal) {
            (Ok(()), Some(p)) => tracing::debug!(
                user_id = %p.user_id,
                project_id = %project.id,
                operation = %operation,
                "access granted"
            ),
            (Err(denial), _) => tracing::debug!(
                user_id = ?principal.map(|p| p.user_id),
                project_id = %project.id,
                operation = %operation,
                reason = ?denial,
                "access denied"
            ),
            _ => {}
        }

        decision
    }
}

/// Evaluation order, first match decides:
/// 1. blocked or deleted project -> only `ChangeBlocked` and admin reads continue
/// 2. `ChangeBlocked` -> platform admins only
/// 3. platform admin -> allow
/// 4. owner -> allow; members by role
/// 5. deny
pub fn evaluate(principal: Option<&Principal>, project: &Project, operation: Operation) -> Result<(), Denial> {
    let principal = principal.ok_or(Denial::NotAuthenticated)?;

    // 1. Suspension outranks every role, including project admins
    if project.is_suspended() {
        let admin_read = operation == Operation::Read && principal.is_admin();
        if operation != Operation::ChangeBlocked && !admin_read {
            return Err(Denial::ResourceSuspended);
        }
    }

    // 2. Blocking is a platform override, not a tenant permission
    if operation == Operation::ChangeBlocked {
        return if principal.is_admin() {
            Ok(())
        } else {
            Err(Denial::InsufficientPrivilege)
        };
    }

    // 3. Superuser
    if principal.is_admin() {
        return Ok(());
    }

    // 4. Ownership and membership
    if project.is_owner(principal.user_id) {
        return Ok(());
    }

    match (project.member_role(principal.user_id), operation) {
        (Some(_), Operation::Read) => Ok(()),
        (Some(MemberRole::Admin), Operation::ManageMembers) => Ok(()),
        (Some(_), Operation::ManageMembers) => Err(Denial::NotAuthorized),
        (Some(role), _) if role.can_mutate() => Ok(()),
        // 5. Deny
        _ => Err(Denial::NotAuthorized),
    }
}

/// Gate for platform-level endpoints (user administration).
pub fn require_admin(principal: &Principal) -> Result<(), Denial> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(Denial::InsufficientPrivilege)
    }
}

/// A user may act on their own account; admins on any.
pub fn require_self_or_admin(principal: &Principal, user_id: uuid::Uuid) -> Result<(), Denial> {
    if principal.is_admin() || principal.user_id == user_id {
        Ok(())
    } else {
        Err(Denial::NotAuthorized)
    }
}
