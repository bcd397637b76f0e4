use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::utils::validate_password_strength;

/// Platform-wide role. `Admin` is the superuser of every project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GlobalRole {
    User,
    Admin,
}

impl GlobalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalRole::User => "user",
            GlobalRole::Admin => "admin",
        }
    }
}

impl fmt::Display for GlobalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GlobalRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(GlobalRole::User),
            "admin" => Ok(GlobalRole::Admin),
            other => Err(AppError::internal(format!("unknown user role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: GlobalRole,
    pub suspended: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub suspended: bool,
    pub refresh_token_hash: Option<String>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        Ok(User {
            id: value.id,
            name: value.name,
            email: value.email,
            role: value.role.parse()?,
            suspended: value.suspended,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ada Lovelace")]
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[schema(example = "ada@example.com")]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
    #[schema(example = "S3cureP@ssw0rd")]
    #[validate(must_match(other = "password", message = "Passwords and Confirm Password do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    #[validate(length(min = 1, message = "password cannot be empty"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UserUpdateRequest {
    #[validate(length(min = 1, max = 100, message = "Display name is required"))]
    pub name: Option<String>,
    #[validate(email(message = "Please include a valid email"))]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccessGrant {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Emails are compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
