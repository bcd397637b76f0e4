use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::security_event::{DbSecurityEvent, NewSecurityEvent, SecurityEvent};
use crate::utils::utc_now;

const EVENT_COLUMNS: &str = "e.id, e.project_id, e.occurred_at, e.ip_address, e.country, e.attack_type, e.target_endpoint, e.payload_preview, e.severity, e.action_taken, e.user_agent, e.created_at";

fn convert(rows: Vec<DbSecurityEvent>) -> AppResult<Vec<SecurityEvent>> {
    rows.into_iter().map(SecurityEvent::try_from).collect()
}

/// Append-only; the caller has already bound the event to a project that
/// passed the API-key gate.
pub async fn insert(pool: &SqlitePool, project_id: Uuid, event: &NewSecurityEvent) -> AppResult<SecurityEvent> {
    let event_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO security_events (id, project_id, occurred_at, ip_address, country, attack_type, target_endpoint, payload_preview, severity, action_taken, user_agent, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(event_id)
    .bind(project_id)
    .bind(event.occurred_at)
    .bind(&event.ip_address)
    .bind(&event.country)
    .bind(&event.attack_type)
    .bind(&event.target_endpoint)
    .bind(&event.payload_preview)
    .bind(event.severity.as_str())
    .bind(event.action_taken.as_str())
    .bind(&event.user_agent)
    .bind(utc_now())
    .execute(pool)
    .await?;

    let sql = format!("SELECT {EVENT_COLUMNS} FROM security_events e WHERE e.id = ?");
    let row = sqlx::query_as::<_, DbSecurityEvent>(&sql)
        .bind(event_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::internal("inserted security event could not be read back"))?;

    row.try_into()
}

pub async fn list_all(pool: &SqlitePool) -> AppResult<Vec<SecurityEvent>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM security_events e ORDER BY e.occurred_at DESC");
    let rows = sqlx::query_as::<_, DbSecurityEvent>(&sql).fetch_all(pool).await?;
    convert(rows)
}

/// Events of live, unblocked projects the user owns or belongs to.
pub async fn list_visible_to(pool: &SqlitePool, user_id: Uuid) -> AppResult<Vec<SecurityEvent>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM security_events e JOIN projects p ON p.id = e.project_id \
         WHERE p.is_deleted = 0 AND p.blocked = 0 \
         AND (p.owner_id = ? OR EXISTS (SELECT 1 FROM project_members m WHERE m.project_id = p.id AND m.user_id = ?)) \
         ORDER BY e.occurred_at DESC"
    );
    let rows = sqlx::query_as::<_, DbSecurityEvent>(&sql)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    convert(rows)
}

pub async fn list_by_project(pool: &SqlitePool, project_id: Uuid) -> AppResult<Vec<SecurityEvent>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM security_events e WHERE e.project_id = ? ORDER BY e.occurred_at DESC");
    let rows = sqlx::query_as::<_, DbSecurityEvent>(&sql)
        .bind(project_id)
        .fetch_all(pool)
        .await?;
    convert(rows)
}
