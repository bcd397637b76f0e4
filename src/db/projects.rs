//! Resource store: projects, their memberships and API keys.
//!
//! Every write that flips a flag or the key is conditional on the `version`
//! read by the caller; `Ok(false)` means another writer got there first.

use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::project::{DbMember, DbProject, MemberRole, Project};
use crate::utils::utc_now;

const PROJECT_COLUMNS: &str = "id, owner_id, name, description, tech_stack, api_key, is_active, blocked, is_deleted, version, created_at, updated_at";

/// The three independent suspension-style switches on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFlag {
    Active,
    Blocked,
    Deleted,
}

impl ProjectFlag {
    fn column(&self) -> &'static str {
        match self {
            ProjectFlag::Active => "is_active",
            ProjectFlag::Blocked => "blocked",
            ProjectFlag::Deleted => "is_deleted",
        }
    }
}

pub struct NewProject<'a> {
    pub owner_id: Uuid,
    pub name: &'a str,
    pub description: &'a str,
    pub tech_stack: Option<&'a Value>,
}

fn encode_tech_stack(tech_stack: Option<&Value>) -> AppResult<Option<String>> {
    tech_stack
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| AppError::internal(format!("failed to encode tech_stack: {err}")))
}

/// Creates the project and records the creator as an admin member.
pub async fn insert(pool: &SqlitePool, new_project: NewProject<'_>) -> AppResult<Project> {
    let now = utc_now();
    let project_id = Uuid::new_v4();
    let tech_stack = encode_tech_stack(new_project.tech_stack)?;

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO projects (id, owner_id, name, description, tech_stack, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(new_project.owner_id)
    .bind(new_project.name)
    .bind(new_project.description)
    .bind(&tech_stack)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await;

    match result {
        Ok(_) => {}
        Err(err) if super::is_unique_violation(&err) => {
            return Err(AppError::conflict("Project with this name already exists for this user"))
        }
        Err(err) => return Err(err.into()),
    }

    sqlx::query("INSERT INTO project_members (project_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)")
        .bind(project_id)
        .bind(new_project.owner_id)
        .bind(MemberRole::Admin.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    fetch(pool, project_id)
        .await?
        .ok_or_else(|| AppError::internal("inserted project could not be read back"))
}

async fn load_members(pool: &SqlitePool, project_id: Uuid) -> AppResult<Vec<DbMember>> {
    Ok(sqlx::query_as::<_, DbMember>(
        "SELECT project_id, user_id, role, joined_at FROM project_members WHERE project_id = ? ORDER BY joined_at ASC",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?)
}

async fn hydrate(pool: &SqlitePool, rows: Vec<DbProject>) -> AppResult<Vec<Project>> {
    let mut projects = Vec::with_capacity(rows.len());
    for row in rows {
        let members = load_members(pool, row.id).await?;
        projects.push(row.into_project(members)?);
    }
    Ok(projects)
}

pub async fn fetch(pool: &SqlitePool, project_id: Uuid) -> AppResult<Option<Project>> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?");
    let row = sqlx::query_as::<_, DbProject>(&sql)
        .bind(project_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let members = load_members(pool, row.id).await?;
            Ok(Some(row.into_project(members)?))
        }
        None => Ok(None),
    }
}

/// Exact-match lookup; the key is a bearer secret and is not hashed.
pub async fn find_by_api_key(pool: &SqlitePool, api_key: &str) -> AppResult<Option<Project>> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE api_key = ?");
    let row = sqlx::query_as::<_, DbProject>(&sql)
        .bind(api_key)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let members = load_members(pool, row.id).await?;
            Ok(Some(row.into_project(members)?))
        }
        None => Ok(None),
    }
}

pub async fn api_key_exists(pool: &SqlitePool, api_key: &str) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM projects WHERE api_key = ?")
        .bind(api_key)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn list_all(pool: &SqlitePool) -> AppResult<Vec<Project>> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC");
    let rows = sqlx::query_as::<_, DbProject>(&sql).fetch_all(pool).await?;
    hydrate(pool, rows).await
}

/// Live projects the user owns or belongs to.
pub async fn list_for_user(pool: &SqlitePool, user_id: Uuid) -> AppResult<Vec<Project>> {
    let sql = format!(
        "SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.is_deleted = 0 AND (p.owner_id = ? OR EXISTS (SELECT 1 FROM project_members m WHERE m.project_id = p.id AND m.user_id = ?)) ORDER BY p.created_at DESC"
    );
    let rows = sqlx::query_as::<_, DbProject>(&sql)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    hydrate(pool, rows).await
}

pub async fn name_taken(pool: &SqlitePool, owner_id: Uuid, name: &str, exclude: Option<Uuid>) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM projects WHERE owner_id = ? AND name = ? AND is_deleted = 0 AND id != ?",
    )
    .bind(owner_id)
    .bind(name)
    .bind(exclude.unwrap_or_else(Uuid::nil))
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn update_details(
    pool: &SqlitePool,
    project_id: Uuid,
    expected_version: i64,
    name: &str,
    description: &str,
    tech_stack: Option<&Value>,
) -> AppResult<bool> {
    let tech_stack = encode_tech_stack(tech_stack)?;

    let result = sqlx::query(
        "UPDATE projects SET name = ?, description = ?, tech_stack = ?, version = version + 1, updated_at = ? WHERE id = ? AND version = ?",
    )
    .bind(name)
    .bind(description)
    .bind(&tech_stack)
    .bind(utc_now())
    .bind(project_id)
    .bind(expected_version)
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(done.rows_affected() > 0),
        Err(err) if super::is_unique_violation(&err) => {
            Err(AppError::conflict("Project with this name already exists for this user"))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn set_flag(
    pool: &SqlitePool,
    project_id: Uuid,
    expected_version: i64,
    flag: ProjectFlag,
    value: bool,
) -> AppResult<bool> {
    let sql = format!(
        "UPDATE projects SET {} = ?, version = version + 1, updated_at = ? WHERE id = ? AND version = ?",
        flag.column()
    );

    let result = sqlx::query(&sql)
        .bind(value)
        .bind(utc_now())
        .bind(project_id)
        .bind(expected_version)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Check-and-set on "no key yet". Unique-index rejections surface as the raw
/// `sqlx::Error` so the issuer can treat them as a collision.
pub async fn set_api_key(
    pool: &SqlitePool,
    project_id: Uuid,
    expected_version: i64,
    api_key: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE projects SET api_key = ?, version = version + 1, updated_at = ? WHERE id = ? AND version = ? AND api_key IS NULL",
    )
    .bind(api_key)
    .bind(utc_now())
    .bind(project_id)
    .bind(expected_version)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn add_member(pool: &SqlitePool, project_id: Uuid, user_id: Uuid, role: MemberRole) -> AppResult<()> {
    let result = sqlx::query("INSERT INTO project_members (project_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)")
        .bind(project_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(utc_now())
        .execute(pool)
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(err) if super::is_unique_violation(&err) => Err(AppError::conflict("User is already a member of this project")),
        Err(err) => Err(err.into()),
    }
}

pub async fn remove_member(pool: &SqlitePool, project_id: Uuid, user_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM project_members WHERE project_id = ? AND user_id = ?")
        .bind(project_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
