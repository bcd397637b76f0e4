//! API-key gate for non-interactive callers.
//!
//! A flat, strictly ordered check: the caller has no identity or role, only
//! possession of a project's key, which grants write-only ingestion rights on
//! that single project.

use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::{projects, users};
use crate::errors::{AppError, AppResult};
use crate::models::project::Project;
use crate::models::user::DbUser;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("API key is required")]
    MissingCredential,
    #[error("Invalid API key")]
    InvalidCredential,
    #[error("Project is deleted and cannot access API")]
    ResourceGone,
    #[error("Project is blocked and cannot access API")]
    ResourceBlocked,
    #[error("Project is inactive and cannot access API")]
    ResourceInactive,
    #[error("Project owner is blocked and cannot access API")]
    OwnerSuspended,
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::MissingCredential => AppError::validation(err.to_string()),
            GateError::InvalidCredential => AppError::unauthorized(err.to_string()),
            GateError::ResourceGone
            | GateError::ResourceBlocked
            | GateError::ResourceInactive
            | GateError::OwnerSuspended => AppError::forbidden(err.to_string()),
        }
    }
}

/// What a caller holding a valid key is allowed to know about its project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ApiKeyContext {
    pub project_id: Uuid,
    pub name: String,
    pub api_key: String,
}

/// Steps 3-6 of the gate, once the key has resolved to a project.
pub fn check_project(project: &Project, owner: Option<&DbUser>) -> Result<(), GateError> {
    if project.is_deleted {
        return Err(GateError::ResourceGone);
    }
    if project.blocked {
        return Err(GateError::ResourceBlocked);
    }
    if !project.is_active {
        return Err(GateError::ResourceInactive);
    }
    match owner {
        Some(owner) if !owner.suspended => Ok(()),
        _ => Err(GateError::OwnerSuspended),
    }
}

/// Runs the full gate against the stores.
pub async fn authorize(pool: &SqlitePool, presented: Option<&str>) -> AppResult<ApiKeyContext> {
    let key = presented
        .filter(|key| !key.trim().is_empty())
        .ok_or(GateError::MissingCredential)?;

    let project = match projects::find_by_api_key(pool, key).await? {
        Some(project) => project,
        None => {
            tracing::warn!("API key rejected: no matching project");
            return Err(GateError::InvalidCredential.into());
        }
    };

    let owner = users::find_by_id(pool, project.owner_id).await?;

    if let Err(err) = check_project(&project, owner.as_ref()) {
        tracing::warn!(project_id = %project.id, reason = ?err, "API key rejected");
        return Err(err.into());
    }

    Ok(ApiKeyContext {
        project_id: project.id,
        name: project.name,
        api_key: key.to_string(),
    })
}
