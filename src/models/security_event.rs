use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::errors::AppError;

pub const MAX_PAYLOAD_PREVIEW_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

impl FromStr for Severity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Severity::Low),
            "Medium" => Ok(Severity::Medium),
            "High" => Ok(Severity::High),
            "Critical" => Ok(Severity::Critical),
            other => Err(AppError::internal(format!("unknown severity: {other}"))),
        }
    }
}

/// What the reporting agent did about the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ActionTaken {
    Logged,
    #[serde(rename = "Blocked IP")]
    BlockedIp,
    #[serde(rename = "Rate Limited")]
    RateLimited,
    #[serde(rename = "Notified Admin")]
    NotifiedAdmin,
    None,
}

impl ActionTaken {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTaken::Logged => "Logged",
            ActionTaken::BlockedIp => "Blocked IP",
            ActionTaken::RateLimited => "Rate Limited",
            ActionTaken::NotifiedAdmin => "Notified Admin",
            ActionTaken::None => "None",
        }
    }
}

impl Default for ActionTaken {
    fn default() -> Self {
        ActionTaken::Logged
    }
}

impl FromStr for ActionTaken {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Logged" => Ok(ActionTaken::Logged),
            "Blocked IP" => Ok(ActionTaken::BlockedIp),
            "Rate Limited" => Ok(ActionTaken::RateLimited),
            "Notified Admin" => Ok(ActionTaken::NotifiedAdmin),
            "None" => Ok(ActionTaken::None),
            other => Err(AppError::internal(format!("unknown action: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub project_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub ip_address: String,
    pub country: Option<String>,
    pub attack_type: String,
    pub target_endpoint: String,
    pub payload_preview: Option<String>,
    pub severity: Severity,
    pub action_taken: ActionTaken,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbSecurityEvent {
    pub id: Uuid,
    pub project_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub ip_address: String,
    pub country: Option<String>,
    pub attack_type: String,
    pub target_endpoint: String,
    pub payload_preview: Option<String>,
    pub severity: String,
    pub action_taken: String,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbSecurityEvent> for SecurityEvent {
    type Error = AppError;

    fn try_from(value: DbSecurityEvent) -> Result<Self, Self::Error> {
        Ok(SecurityEvent {
            id: value.id,
            project_id: value.project_id,
            occurred_at: value.occurred_at,
            ip_address: value.ip_address,
            country: value.country,
            attack_type: value.attack_type,
            target_endpoint: value.target_endpoint,
            payload_preview: value.payload_preview,
            severity: value.severity.parse()?,
            action_taken: value.action_taken.parse()?,
            user_agent: value.user_agent,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SecurityEventCreateRequest {
    /// Optional; when present it must name the project the API key belongs to.
    pub project_id: Option<Uuid>,
    pub occurred_at: Option<DateTime<Utc>>,
    #[schema(example = "203.0.113.7")]
    #[validate(custom(function = "validate_ip_address"))]
    pub ip_address: String,
    #[validate(length(max = 100))]
    pub country: Option<String>,
    #[schema(example = "SQLi")]
    #[validate(length(min = 1, message = "attack_type is required"))]
    pub attack_type: String,
    #[schema(example = "/api/login")]
    #[validate(length(min = 1, max = 500))]
    pub target_endpoint: String,
    pub payload_preview: Option<String>,
    pub severity: Option<Severity>,
    pub action_taken: Option<ActionTaken>,
    #[validate(length(max = 500))]
    pub user_agent: Option<String>,
}

/// A validated, normalised event ready to be bound to a project.
#[derive(Debug, Clone)]
pub struct NewSecurityEvent {
    pub occurred_at: DateTime<Utc>,
    pub ip_address: String,
    pub country: Option<String>,
    pub attack_type: String,
    pub target_endpoint: String,
    pub payload_preview: Option<String>,
    pub severity: Severity,
    pub action_taken: ActionTaken,
    pub user_agent: Option<String>,
}

impl SecurityEventCreateRequest {
    pub fn into_new_event(self, now: DateTime<Utc>) -> Result<NewSecurityEvent, AppError> {
        let attack_type = self.attack_type.trim().to_string();
        if attack_type.is_empty() {
            return Err(AppError::validation("attack_type is required"));
        }

        let target_endpoint = self.target_endpoint.trim().to_string();
        if target_endpoint.is_empty() {
            return Err(AppError::validation("target_endpoint is required"));
        }

        let country = self
            .country
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(NewSecurityEvent {
            occurred_at: self.occurred_at.unwrap_or(now),
            ip_address: self.ip_address.trim().to_string(),
            country,
            attack_type,
            target_endpoint,
            payload_preview: self.payload_preview.as_deref().map(sanitize_payload_preview),
            severity: self.severity.unwrap_or_default(),
            action_taken: self.action_taken.unwrap_or_default(),
            user_agent: self.user_agent,
        })
    }
}

/// Truncates to `MAX_PAYLOAD_PREVIEW_CHARS` characters and strips NUL bytes.
pub fn sanitize_payload_preview(raw: &str) -> String {
    raw.chars()
        .take(MAX_PAYLOAD_PREVIEW_CHARS)
        .filter(|c| *c != '\0')
        .collect()
}

fn validate_ip_address(value: &str) -> Result<(), ValidationError> {
    IpAddr::from_str(value.trim())
        .map(|_| ())
        .map_err(|_| {
            let mut err = ValidationError::new("ip_address");
            err.message = Some("Invalid IP address format".into());
            err
        })
}
