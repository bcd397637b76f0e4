//! Authorization - Access Decision Engine and API-key issuance
//!
//! Project-scoped operations go through one ordered decision procedure
//! (`evaluate`). Suspension of the project is checked before any role, with
//! `ChangeBlocked` carved out so a platform admin can always unblock.

mod api_key;
mod evaluator;
mod principal;

pub use api_key::{generate_api_key, issue_api_key, issue_api_key_with, API_KEY_BYTES};
pub use evaluator::{evaluate, require_admin, require_self_or_admin, PolicyEvaluator, ProjectPolicy};
pub use principal::Principal;

use std::fmt;

use crate::errors::AppError;

/// Operations the engine decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Update,
    Delete,
    ManageMembers,
    ChangeActive,
    ChangeBlocked,
    IssueApiKey,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::Read,
        Operation::Update,
        Operation::Delete,
        Operation::ManageMembers,
        Operation::ChangeActive,
        Operation::ChangeBlocked,
        Operation::IssueApiKey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::ManageMembers => "manage-members",
            Operation::ChangeActive => "change-active",
            Operation::ChangeBlocked => "change-blocked",
            Operation::IssueApiKey => "issue-api-key",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the engine said no.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    #[error("Authentication required")]
    NotAuthenticated,
    #[error("Project is blocked or deleted")]
    ResourceSuspended,
    #[error("Only platform administrators may perform this action")]
    InsufficientPrivilege,
    #[error("You do not have permission to perform this action on this project")]
    NotAuthorized,
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::NotAuthenticated => AppError::unauthorized(denial.to_string()),
            _ => AppError::forbidden(denial.to_string()),
        }
    }
}
