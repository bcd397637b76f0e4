pub mod auth;
pub mod health;
pub mod projects;
pub mod security_events;
pub mod users;

use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Operation, Principal};
use crate::db;
use crate::errors::{AppError, AppResult};
use crate::models::project::Project;

/// Trims `value` and rejects it when nothing is left.
pub(crate) fn non_blank<'a>(value: &'a str, message: &str) -> AppResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(message));
    }
    Ok(value)
}

/// Loads a project and asks the policy whether `principal` may perform
/// `operation` on it.
pub(crate) async fn authorized_project(
    state: &AppState,
    principal: &Principal,
    project_id: Uuid,
    operation: Operation,
) -> AppResult<Project> {
    let project = db::projects::fetch(&state.pool, project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;

    state.policy.evaluate(Some(principal), &project, operation)?;
    Ok(project)
}

/// Hides the key from callers who could not have issued it.
pub(crate) fn visible_to(state: &AppState, principal: &Principal, project: Project) -> Project {
    match state.policy.evaluate(Some(principal), &project, Operation::IssueApiKey) {
        Ok(()) => project,
        Err(_) => project.without_api_key(),
    }
}
