use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{authorized_project, non_blank, visible_to};
use crate::app::AppState;
use crate::authz::{issue_api_key, Operation, Principal};
use crate::db::projects::{self, NewProject, ProjectFlag};
use crate::db::users;
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiKey, ValidatedJson};
use crate::gate::{self, ApiKeyContext};
use crate::jwt::AuthUser;
use crate::models::project::{ApiKeyIssued, MemberAddRequest, Project, ProjectCreateRequest, ProjectUpdateRequest};
use crate::models::response::ApiResponse;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BlockedRequest {
    pub blocked: bool,
}

fn modified_concurrently() -> AppError {
    AppError::conflict("Project was modified concurrently, retry the request")
}

async fn reload(state: &AppState, principal: &Principal, project_id: Uuid) -> AppResult<Project> {
    let project = projects::fetch(&state.pool, project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;
    Ok(visible_to(state, principal, project))
}

#[utoipa::path(
    post,
    path = "/api/projects",
    tag = "Projects",
    security(("bearerAuth" = [])),
    request_body = ProjectCreateRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Invalid input or duplicate project name")
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(payload): ValidatedJson<ProjectCreateRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Project>>)> {
    let principal = state.sessions().load_principal(&auth).await?;
    let name = non_blank(&payload.name, "Name must not be empty")?;
    let description = non_blank(&payload.description, "Description must not be empty")?;

    if projects::name_taken(&state.pool, principal.user_id, name, None).await? {
        return Err(AppError::conflict("Project with this name already exists for this user"));
    }

    let project = projects::insert(
        &state.pool,
        NewProject {
            owner_id: principal.user_id,
            name,
            description,
            tech_stack: payload.tech_stack.as_ref(),
        },
    )
    .await?;

    tracing::info!(project_id = %project.id, owner_id = %principal.user_id, "project created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Project created successfully", project))))
}

#[utoipa::path(
    get,
    path = "/api/projects",
    tag = "Projects",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Projects visible to the caller", body = [Project]))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<Project>>>> {
    let principal = state.sessions().load_principal(&auth).await?;

    let candidates = if principal.is_admin() {
        projects::list_all(&state.pool).await?
    } else {
        projects::list_for_user(&state.pool, principal.user_id).await?
    };

    let projects: Vec<Project> = candidates
        .into_iter()
        .filter(|project| state.policy.evaluate(Some(&principal), project, Operation::Read).is_ok())
        .map(|project| visible_to(&state, &principal, project))
        .collect();

    Ok(Json(ApiResponse::ok("Projects retrieved", projects)))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    tag = "Projects",
    security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project detail", body = Project),
        (status = 403, description = "Not permitted or project suspended"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Project>>> {
    let principal = state.sessions().load_principal(&auth).await?;
    let project = authorized_project(&state, &principal, id, Operation::Read).await?;
    Ok(Json(ApiResponse::ok("Project retrieved", visible_to(&state, &principal, project))))
}

#[utoipa::path(
    put,
    path = "/api/projects/{id}",
    tag = "Projects",
    security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectUpdateRequest,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 400, description = "Invalid input, duplicate name or concurrent modification"),
        (status = 403, description = "Not permitted or project suspended")
    )
)]
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ProjectUpdateRequest>,
) -> AppResult<Json<ApiResponse<Project>>> {
    let principal = state.sessions().load_principal(&auth).await?;
    let project = authorized_project(&state, &principal, id, Operation::Update).await?;

    let name = match payload.name.as_deref() {
        Some(name) => non_blank(name, "Name must not be empty")?,
        None => project.name.as_str(),
    };
    let description = match payload.description.as_deref() {
        Some(description) => non_blank(description, "Description must not be empty")?,
        None => project.description.as_str(),
    };
    let tech_stack = payload.tech_stack.as_ref().or(project.tech_stack.as_ref());

    if name != project.name && projects::name_taken(&state.pool, project.owner_id, name, Some(id)).await? {
        return Err(AppError::conflict("Project with this name already exists for this user"));
    }

    if !projects::update_details(&state.pool, id, project.version, name, description, tech_stack).await? {
        return Err(modified_concurrently());
    }

    let updated = reload(&state, &principal, id).await?;
    Ok(Json(ApiResponse::ok("Project updated successfully", updated)))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    tag = "Projects",
    security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project soft deleted"),
        (status = 403, description = "Not permitted or project suspended")
    )
)]
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    let principal = state.sessions().load_principal(&auth).await?;
    let project = authorized_project(&state, &principal, id, Operation::Delete).await?;

    if !projects::set_flag(&state.pool, id, project.version, ProjectFlag::Deleted, true).await? {
        return Err(modified_concurrently());
    }

    tracing::info!(project_id = %id, deleted_by = %principal.user_id, "project deleted");
    Ok(Json(ApiResponse::message("Project deleted successfully")))
}

#[utoipa::path(
    put,
    path = "/api/projects/{id}/active",
    tag = "Projects",
    security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ActiveRequest,
    responses(
        (status = 200, description = "Active flag updated", body = Project),
        (status = 403, description = "Not permitted or project suspended")
    )
)]
pub async fn set_project_active(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ActiveRequest>,
) -> AppResult<Json<ApiResponse<Project>>> {
    let principal = state.sessions().load_principal(&auth).await?;
    let project = authorized_project(&state, &principal, id, Operation::ChangeActive).await?;

    if !projects::set_flag(&state.pool, id, project.version, ProjectFlag::Active, payload.is_active).await? {
        return Err(modified_concurrently());
    }

    tracing::info!(project_id = %id, is_active = payload.is_active, changed_by = %principal.user_id, "project active flag changed");

    let updated = reload(&state, &principal, id).await?;
    let message = if payload.is_active { "Project activated" } else { "Project deactivated" };
    Ok(Json(ApiResponse::ok(message, updated)))
}

#[utoipa::path(
    put,
    path = "/api/projects/{id}/blocked",
    tag = "Projects",
    security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = BlockedRequest,
    responses(
        (status = 200, description = "Blocked flag updated", body = Project),
        (status = 403, description = "Caller is not a platform admin")
    )
)]
pub async fn set_project_blocked(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<BlockedRequest>,
) -> AppResult<Json<ApiResponse<Project>>> {
    let principal = state.sessions().load_principal(&auth).await?;
    let project = authorized_project(&state, &principal, id, Operation::ChangeBlocked).await?;

    if !projects::set_flag(&state.pool, id, project.version, ProjectFlag::Blocked, payload.blocked).await? {
        return Err(modified_concurrently());
    }

    tracing::info!(project_id = %id, blocked = payload.blocked, changed_by = %principal.user_id, "project blocked flag changed");

    let updated = reload(&state, &principal, id).await?;
    let message = if payload.blocked { "Project blocked" } else { "Project unblocked" };
    Ok(Json(ApiResponse::ok(message, updated)))
}

#[utoipa::path(
    post,
    path = "/api/projects/{id}/api-key",
    tag = "Projects",
    security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 201, description = "API key issued", body = ApiKeyIssued),
        (status = 400, description = "Project already has an API key"),
        (status = 403, description = "Not permitted or project suspended"),
        (status = 500, description = "Could not generate a unique key")
    )
)]
pub async fn issue_project_api_key(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ApiResponse<ApiKeyIssued>>)> {
    let principal = state.sessions().load_principal(&auth).await?;
    let project = authorized_project(&state, &principal, id, Operation::IssueApiKey).await?;

    let api_key = issue_api_key(&state.pool, &project, state.api_key_max_attempts).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("API key generated successfully", ApiKeyIssued { project_id: id, api_key })),
    ))
}

#[utoipa::path(
    post,
    path = "/api/projects/{id}/members",
    tag = "Projects",
    security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = MemberAddRequest,
    responses(
        (status = 201, description = "Member added", body = Project),
        (status = 400, description = "User is already a member"),
        (status = 403, description = "Not permitted or project suspended"),
        (status = 404, description = "Project or user not found")
    )
)]
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<MemberAddRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Project>>)> {
    let principal = state.sessions().load_principal(&auth).await?;
    authorized_project(&state, &principal, id, Operation::ManageMembers).await?;

    if users::find_by_id(&state.pool, payload.user_id).await?.is_none() {
        return Err(AppError::not_found("User not found"));
    }

    let role = payload.role.unwrap_or_default();
    projects::add_member(&state.pool, id, payload.user_id, role).await?;
    tracing::info!(project_id = %id, user_id = %payload.user_id, role = %role, "member added");

    let updated = reload(&state, &principal, id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Member added", updated))))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{id}/members/{user_id}",
    tag = "Projects",
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Project id"),
        ("user_id" = Uuid, Path, description = "Member to remove")
    ),
    responses(
        (status = 200, description = "Member removed", body = Project),
        (status = 400, description = "The owner cannot be removed"),
        (status = 403, description = "Not permitted or project suspended"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<Project>>> {
    let principal = state.sessions().load_principal(&auth).await?;
    let project = authorized_project(&state, &principal, id, Operation::ManageMembers).await?;

    if project.is_owner(user_id) {
        return Err(AppError::validation("The project owner cannot be removed"));
    }

    if !projects::remove_member(&state.pool, id, user_id).await? {
        return Err(AppError::not_found("Member not found"));
    }
    tracing::info!(project_id = %id, user_id = %user_id, "member removed");

    let updated = reload(&state, &principal, id).await?;
    Ok(Json(ApiResponse::ok("Member removed", updated)))
}

#[utoipa::path(
    post,
    path = "/api/projects/validate-key",
    tag = "Projects",
    security(("apiKeyAuth" = [])),
    responses(
        (status = 200, description = "Key is valid", body = ApiKeyContext),
        (status = 400, description = "API key is required"),
        (status = 401, description = "Invalid API key"),
        (status = 403, description = "Project deleted, blocked, inactive or owner blocked")
    )
)]
pub async fn validate_api_key(
    State(state): State<AppState>,
    ApiKey(key): ApiKey,
) -> AppResult<Json<ApiResponse<ApiKeyContext>>> {
    let context = gate::authorize(&state.pool, key.as_deref()).await?;
    Ok(Json(ApiResponse::ok("API key is valid", context)))
}
