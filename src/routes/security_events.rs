use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use super::authorized_project;
use crate::app::AppState;
use crate::authz::Operation;
use crate::db::security_events;
use crate::errors::AppResult;
use crate::extract::{parse_validated, ApiKey};
use crate::gate::{self, GateError};
use crate::jwt::AuthUser;
use crate::models::response::ApiResponse;
use crate::models::security_event::{SecurityEvent, SecurityEventCreateRequest};
use crate::utils::utc_now;

/// The key is checked before the body is parsed, so an unauthenticated caller
/// learns nothing about payload validation.
#[utoipa::path(
    post,
    path = "/api/security-events",
    tag = "Security Events",
    security(("apiKeyAuth" = [])),
    request_body = SecurityEventCreateRequest,
    responses(
        (status = 201, description = "Event recorded", body = SecurityEvent),
        (status = 400, description = "API key missing or invalid payload"),
        (status = 401, description = "Invalid API key"),
        (status = 403, description = "Project deleted, blocked, inactive or owner blocked")
    )
)]
pub async fn ingest_event(
    State(state): State<AppState>,
    ApiKey(key): ApiKey,
    body: Bytes,
) -> AppResult<(StatusCode, Json<ApiResponse<SecurityEvent>>)> {
    let context = gate::authorize(&state.pool, key.as_deref()).await?;

    let request: SecurityEventCreateRequest = parse_validated(&body)?;
    if let Some(claimed) = request.project_id {
        if claimed != context.project_id {
            tracing::warn!(project_id = %context.project_id, claimed = %claimed, "event names a different project than its key");
            return Err(GateError::InvalidCredential.into());
        }
    }

    let new_event = request.into_new_event(utc_now())?;
    let event = security_events::insert(&state.pool, context.project_id, &new_event).await?;

    tracing::info!(
        project_id = %context.project_id,
        event_id = %event.id,
        attack_type = %event.attack_type,
        severity = %event.severity.as_str(),
        "security event recorded"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Security event logged successfully", event))))
}

#[utoipa::path(
    get,
    path = "/api/security-events",
    tag = "Security Events",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Events the caller may read", body = [SecurityEvent]))
)]
pub async fn list_events(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<SecurityEvent>>>> {
    let principal = state.sessions().load_principal(&auth).await?;

    let events = if principal.is_admin() {
        security_events::list_all(&state.pool).await?
    } else {
        security_events::list_visible_to(&state.pool, principal.user_id).await?
    };

    Ok(Json(ApiResponse::ok("Security events retrieved", events)))
}

#[utoipa::path(
    get,
    path = "/api/security-events/project/{project_id}",
    tag = "Security Events",
    security(("bearerAuth" = [])),
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Events of the project, possibly empty", body = [SecurityEvent]),
        (status = 403, description = "Not permitted or project suspended"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn list_project_events(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<SecurityEvent>>>> {
    let principal = state.sessions().load_principal(&auth).await?;
    authorized_project(&state, &principal, project_id, Operation::Read).await?;

    let events = security_events::list_by_project(&state.pool, project_id).await?;
    Ok(Json(ApiResponse::ok("Security events retrieved", events)))
}
