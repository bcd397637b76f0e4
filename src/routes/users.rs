use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::non_blank;
use crate::app::AppState;
use crate::authz::{require_admin, require_self_or_admin};
use crate::db::users;
use crate::errors::{AppError, AppResult};
use crate::extract::ValidatedJson;
use crate::jwt::AuthUser;
use crate::models::response::ApiResponse;
use crate::models::user::{normalize_email, User, UserUpdateRequest};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BlockRequest {
    pub blocked: bool,
}

async fn fetch_user(state: &AppState, user_id: Uuid) -> AppResult<User> {
    let db_user = users::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    User::try_from(db_user)
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Caller is not a platform admin")
    )
)]
pub async fn list_users(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<ApiResponse<Vec<User>>>> {
    let principal = state.sessions().load_principal(&auth).await?;
    require_admin(&principal)?;

    let users = users::list(&state.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(ApiResponse::ok("Users retrieved", users)))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<User>>> {
    let principal = state.sessions().load_principal(&auth).await?;
    require_self_or_admin(&principal, id)?;

    let user = fetch_user(&state, id).await?;
    Ok(Json(ApiResponse::ok("User retrieved", user)))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid input or email already registered"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UserUpdateRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let principal = state.sessions().load_principal(&auth).await?;
    require_self_or_admin(&principal, id)?;

    let current = fetch_user(&state, id).await?;

    let name = match payload.name.as_deref() {
        Some(name) => non_blank(name, "Name must not be empty")?.to_string(),
        None => current.name.clone(),
    };
    let email = payload
        .email
        .as_deref()
        .map(normalize_email)
        .unwrap_or_else(|| current.email.clone());

    if email != current.email && users::email_taken(&state.pool, &email, Some(id)).await? {
        return Err(AppError::conflict("User already exists"));
    }

    if !users::update_profile(&state.pool, id, &name, &email).await? {
        return Err(AppError::not_found("User not found"));
    }

    let user = fetch_user(&state, id).await?;
    Ok(Json(ApiResponse::ok("User updated", user)))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 403, description = "Caller is not a platform admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    let principal = state.sessions().load_principal(&auth).await?;
    require_admin(&principal)?;

    if !users::delete(&state.pool, id).await? {
        return Err(AppError::not_found("User not found"));
    }

    tracing::info!(user_id = %id, deleted_by = %principal.user_id, "user deleted");
    Ok(Json(ApiResponse::message("User deleted")))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/block",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    request_body = BlockRequest,
    responses(
        (status = 200, description = "Suspension updated", body = User),
        (status = 403, description = "Caller is not a platform admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn set_user_blocked(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<BlockRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let principal = state.sessions().load_principal(&auth).await?;
    require_admin(&principal)?;

    if id == principal.user_id && payload.blocked {
        return Err(AppError::validation("Administrators cannot block themselves"));
    }

    if !users::set_suspended(&state.pool, id, payload.blocked).await? {
        return Err(AppError::not_found("User not found"));
    }

    tracing::info!(user_id = %id, blocked = payload.blocked, changed_by = %principal.user_id, "user suspension changed");

    let user = fetch_user(&state, id).await?;
    let message = if payload.blocked { "User blocked" } else { "User unblocked" };
    Ok(Json(ApiResponse::ok(message, user)))
}
