//! Credential store: user records and their refresh-token slot.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, GlobalRole};
use crate::utils::utc_now;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, suspended, refresh_token_hash, refresh_token_expires_at, created_at, updated_at";

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: GlobalRole,
}

pub async fn insert(pool: &SqlitePool, new_user: NewUser<'_>) -> AppResult<DbUser> {
    let now = utc_now();
    let user_id = Uuid::new_v4();

    let result = sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, suspended, created_at, updated_at) VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(user_id)
    .bind(new_user.name)
    .bind(new_user.email)
    .bind(new_user.password_hash)
    .bind(new_user.role.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => {}
        Err(err) if super::is_unique_violation(&err) => return Err(AppError::conflict("email already exists")),
        Err(err) => return Err(err.into()),
    }

    find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::internal("inserted user could not be read back"))
}

pub async fn find_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    Ok(sqlx::query_as::<_, DbUser>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
    Ok(sqlx::query_as::<_, DbUser>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?)
}

pub async fn find_by_refresh_hash(pool: &SqlitePool, token_hash: &str) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE refresh_token_hash = ?");
    Ok(sqlx::query_as::<_, DbUser>(&sql)
        .bind(token_hash)
        .fetch_optional(pool)
        .await?)
}

pub async fn list(pool: &SqlitePool) -> AppResult<Vec<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
    Ok(sqlx::query_as::<_, DbUser>(&sql).fetch_all(pool).await?)
}

pub async fn email_taken(pool: &SqlitePool, email: &str, exclude: Option<Uuid>) -> AppResult<bool> {
    let count: i64 = match exclude {
        Some(user_id) => {
            sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(user_id)
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ?")
                .bind(email)
                .fetch_one(pool)
                .await?
        }
    };

    Ok(count > 0)
}

/// Replaces whatever refresh token the user held; login is not additive.
pub async fn store_refresh_token(
    pool: &SqlitePool,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query("UPDATE users SET refresh_token_hash = ?, refresh_token_expires_at = ?, updated_at = ? WHERE id = ?")
        .bind(token_hash)
        .bind(expires_at)
        .bind(utc_now())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn clear_refresh_token(pool: &SqlitePool, user_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE users SET refresh_token_hash = NULL, refresh_token_expires_at = NULL, updated_at = ? WHERE id = ?")
        .bind(utc_now())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_profile(pool: &SqlitePool, user_id: Uuid, name: &str, email: &str) -> AppResult<bool> {
    let result = sqlx::query("UPDATE users SET name = ?, email = ?, updated_at = ? WHERE id = ?")
        .bind(name)
        .bind(email)
        .bind(utc_now())
        .bind(user_id)
        .execute(pool)
        .await;

    match result {
        Ok(done) => Ok(done.rows_affected() > 0),
        Err(err) if super::is_unique_violation(&err) => Err(AppError::conflict("email already exists")),
        Err(err) => Err(err.into()),
    }
}

/// Suspending also drops the refresh token in the same statement, so a
/// suspended user never holds a live session.
pub async fn set_suspended(pool: &SqlitePool, user_id: Uuid, suspended: bool) -> AppResult<bool> {
    let sql = if suspended {
        "UPDATE users SET suspended = 1, refresh_token_hash = NULL, refresh_token_expires_at = NULL, updated_at = ? WHERE id = ?"
    } else {
        "UPDATE users SET suspended = 0, updated_at = ? WHERE id = ?"
    };

    let result = sqlx::query(sql)
        .bind(utc_now())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &SqlitePool, user_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
