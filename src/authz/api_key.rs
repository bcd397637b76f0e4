use rand_core::{OsRng, RngCore};
use sqlx::SqlitePool;

use crate::db::{self, projects};
use crate::errors::{AppError, AppResult};
use crate::models::project::Project;

/// Raw key size; rendered as 64 lowercase hex characters.
pub const API_KEY_BYTES: usize = 32;

pub fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues the project's first API key. The caller must already hold
/// `Operation::IssueApiKey` on `project`.
pub async fn issue_api_key(pool: &SqlitePool, project: &Project, max_attempts: u32) -> AppResult<String> {
    issue_api_key_with(pool, project, max_attempts, generate_api_key).await
}

/// As [`issue_api_key`], with the key source supplied by the caller.
///
/// Each attempt draws a fresh key, skips it if any project already holds it,
/// then writes it with a check-and-set on "no key yet" at the version the
/// caller read. A unique-index rejection counts as a collision.
pub async fn issue_api_key_with<F>(
    pool: &SqlitePool,
    project: &Project,
    max_attempts: u32,
    mut next_key: F,
) -> AppResult<String>
where
    F: FnMut() -> String,
{
    if project.api_key.is_some() {
        return Err(AppError::conflict("API key already exists for this project"));
    }

    for attempt in 1..=max_attempts {
        let candidate = next_key();

        if projects::api_key_exists(pool, &candidate).await? {
            tracing::warn!(project_id = %project.id, attempt, "generated API key collided, retrying");
            continue;
        }

        match projects::set_api_key(pool, project.id, project.version, &candidate).await {
            Ok(true) => {
                tracing::info!(project_id = %project.id, attempt, "API key issued");
                return Ok(candidate);
            }
            Ok(false) => return Err(lost_race(pool, project).await?),
            Err(err) if db::is_unique_violation(&err) => {
                tracing::warn!(project_id = %project.id, attempt, "API key rejected by unique index, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(AppError::dependency(format!(
        "Failed to generate unique API key after {max_attempts} attempts"
    )))
}

/// The conditional write matched nothing: either a key appeared or the
/// project changed underneath us.
async fn lost_race(pool: &SqlitePool, project: &Project) -> AppResult<AppError> {
    let current = projects::fetch(pool, project.id)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;

    if current.api_key.is_some() {
        Ok(AppError::conflict("API key already exists for this project"))
    } else {
        Ok(AppError::conflict("Project was modified concurrently, retry the request"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_fixed_width_hex() {
        let key = generate_api_key();
        assert_eq!(key.len(), API_KEY_BYTES * 2);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(key, generate_api_key());
    }
}
