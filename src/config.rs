use std::sync::Arc;

use crate::errors::AppError;
use crate::jwt::JwtConfig;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_ACCESS_TTL_SECS: i64 = 60 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_API_KEY_MAX_ATTEMPTS: u32 = 5;

/// Process-wide settings, read once at startup and handed to `create_app`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub api_key_max_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| AppError::configuration("DATABASE_URL not set"))?;
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        if secret.is_empty() {
            return Err(AppError::configuration("JWT_SECRET must not be empty"));
        }

        let port = env_or("APP_PORT", DEFAULT_PORT)?;
        let access_ttl_secs = env_or("ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?;
        let refresh_ttl_secs = env_or("REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TTL_SECS)?;
        let api_key_max_attempts = env_or("API_KEY_MAX_ATTEMPTS", DEFAULT_API_KEY_MAX_ATTEMPTS)?;

        if api_key_max_attempts == 0 {
            return Err(AppError::configuration("API_KEY_MAX_ATTEMPTS must be at least 1"));
        }

        Ok(Self {
            database_url,
            port,
            jwt: JwtConfig {
                secret: Arc::new(secret.into_bytes()),
                access_ttl_secs,
                refresh_ttl_secs,
            },
            api_key_max_attempts,
        })
    }

    /// Configuration for an already-open pool, used by tests and tooling.
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            database_url: String::new(),
            port: DEFAULT_PORT,
            jwt: JwtConfig {
                secret: Arc::new(secret.into()),
                access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
                refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            },
            api_key_max_attempts: DEFAULT_API_KEY_MAX_ATTEMPTS,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::configuration(format!("{key} must be a valid number"))),
        Err(_) => Ok(default),
    }
}
