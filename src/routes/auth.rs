use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::non_blank;
use crate::app::AppState;
use crate::db::users::{self, NewUser};
use crate::errors::{AppError, AppResult, AuthError};
use crate::extract::ValidatedJson;
use crate::jwt::AuthUser;
use crate::models::response::ApiResponse;
use crate::models::user::{
    normalize_email, AccessGrant, GlobalRole, LoginRequest, LoginResponse, RefreshRequest, RegisterRequest, User,
};
use crate::utils::hash_password;

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = User),
        (status = 400, description = "Invalid input or email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let email = normalize_email(&payload.email);
    let name = non_blank(&payload.name, "Name must not be empty")?;

    if users::email_taken(&state.pool, &email, None).await? {
        return Err(AppError::conflict("User already exists"));
    }

    let password_hash = hash_password(&payload.password)?;
    let db_user = users::insert(
        &state.pool,
        NewUser {
            name,
            email: &email,
            password_hash: &password_hash,
            role: GlobalRole::User,
        },
    )
    .await?;

    let user = User::try_from(db_user)?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok("User registered successfully", user))))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account blocked")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let session = state.sessions().authenticate(&payload.email, &payload.password).await?;
    Ok(Json(ApiResponse::ok("Login successful", session)))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessGrant),
        (status = 401, description = "Refresh token missing, unknown, expired or invalid"),
        (status = 403, description = "Account blocked")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RefreshRequest>,
) -> AppResult<Json<ApiResponse<AccessGrant>>> {
    let grant = state.sessions().refresh(payload.refresh_token.as_deref()).await?;
    Ok(Json(ApiResponse::ok("Token refreshed", grant)))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Missing or invalid access token")
    )
)]
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<ApiResponse<()>>> {
    state.sessions().invalidate(auth.user_id).await?;
    Ok(Json(ApiResponse::message("Logged out successfully")))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid access token")
    )
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<ApiResponse<User>>> {
    let db_user = users::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or(AuthError::UnknownAccount)?;
    if db_user.suspended {
        return Err(AuthError::AccountSuspended.into());
    }

    let user = User::try_from(db_user)?;
    Ok(Json(ApiResponse::ok("Current user", user)))
}
