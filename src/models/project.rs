use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;

/// Role a user holds inside a single project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Developer,
    Viewer,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Developer => "developer",
            MemberRole::Viewer => "viewer",
        }
    }

    pub fn can_mutate(&self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Developer)
    }
}

impl Default for MemberRole {
    fn default() -> Self {
        MemberRole::Developer
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(MemberRole::Admin),
            "developer" => Ok(MemberRole::Developer),
            "viewer" => Ok(MemberRole::Viewer),
            other => Err(AppError::internal(format!("unknown member role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Member {
    pub user_id: Uuid,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    #[schema(value_type = Option<Object>)]
    pub tech_stack: Option<Value>,
    pub members: Vec<Member>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub has_api_key: bool,
    pub is_active: bool,
    pub blocked: bool,
    pub is_deleted: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    pub fn member_role(&self, user_id: Uuid) -> Option<MemberRole> {
        self.members.iter().find(|m| m.user_id == user_id).map(|m| m.role)
    }

    /// Blocked or soft-deleted.
    pub fn is_suspended(&self) -> bool {
        self.blocked || self.is_deleted
    }

    /// Copy safe to show callers that may read but not manage the project.
    pub fn without_api_key(mut self) -> Self {
        self.api_key = None;
        self
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProject {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub tech_stack: Option<String>,
    pub api_key: Option<String>,
    pub is_active: bool,
    pub blocked: bool,
    pub is_deleted: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbMember {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

impl TryFrom<DbMember> for Member {
    type Error = AppError;

    fn try_from(value: DbMember) -> Result<Self, Self::Error> {
        Ok(Member {
            user_id: value.user_id,
            role: value.role.parse()?,
            joined_at: value.joined_at,
        })
    }
}

impl DbProject {
    pub fn into_project(self, members: Vec<DbMember>) -> Result<Project, AppError> {
        let tech_stack = match self.tech_stack {
            Some(raw) => Some(
                serde_json::from_str(&raw)
                    .map_err(|err| AppError::internal(format!("corrupt tech_stack for project {}: {err}", self.id)))?,
            ),
            None => None,
        };

        let members = members
            .into_iter()
            .map(Member::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Project {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            description: self.description,
            tech_stack,
            members,
            has_api_key: self.api_key.is_some(),
            api_key: self.api_key,
            is_active: self.is_active,
            blocked: self.blocked,
            is_deleted: self.is_deleted,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProjectCreateRequest {
    #[schema(example = "Storefront API")]
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[schema(example = "Public checkout service")]
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[schema(value_type = Option<Object>)]
    pub tech_stack: Option<Value>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProjectUpdateRequest {
    #[validate(length(min = 1, max = 100, message = "Name must not be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Description must not be empty"))]
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub tech_stack: Option<Value>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MemberAddRequest {
    pub user_id: Uuid,
    pub role: Option<MemberRole>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiKeyIssued {
    pub project_id: Uuid,
    pub api_key: String,
}
