use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("dependency failure: {0}")]
    Dependency(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            // uniqueness violations have always been reported as 400 to clients
            AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_)
            | AppError::Dependency(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Unauthorized(_) => "authentication",
            AppError::Forbidden(_) => "authorization",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Configuration(_)
            | AppError::Dependency(_)
            | AppError::Database(_)
            | AppError::Internal(_) => "dependency",
        }
    }

    /// Client-facing message. Store and internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(m)
            | AppError::Unauthorized(m)
            | AppError::Forbidden(m)
            | AppError::NotFound(m)
            | AppError::Conflict(m)
            | AppError::Dependency(m) => m.clone(),
            AppError::Configuration(_) | AppError::Database(_) | AppError::Internal(_) => {
                "internal server error".to_string()
            }
        }
    }
}

/// Failures of the session layer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Your account has been blocked")]
    AccountSuspended,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid token")]
    TokenInvalid,
    #[error("Refresh token not recognised")]
    TokenNotFound,
    #[error("Authorization token missing")]
    MissingToken,
    #[error("Account no longer exists")]
    UnknownAccount,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AccountSuspended => AppError::forbidden(err.to_string()),
            _ => AppError::unauthorized(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
    error: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            AppError::Database(err) => tracing::error!(error = %err, "database failure"),
            AppError::Configuration(msg) | AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal failure")
            }
            AppError::Dependency(msg) => tracing::error!(error = %msg, "dependency failure"),
            _ => {}
        }

        let payload = ErrorResponse {
            success: false,
            message: self.public_message(),
            error: self.kind(),
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
