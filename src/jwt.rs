use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AuthError};
use crate::models::user::GlobalRole;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

/// Access tokens are short-lived and verified statelessly; refresh tokens are
/// long-lived and only honoured while their hash is stored on the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: GlobalRole,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

/// A freshly signed token together with its expiry.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl JwtConfig {
    pub fn ttl_secs(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        }
    }

    pub fn encode(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        email: &str,
        role: GlobalRole,
    ) -> Result<SignedToken, AppError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.ttl_secs(kind));

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            kind,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::internal(format!("failed to sign token: {err}")))?;

        Ok(SignedToken { token, expires_at: exp })
    }

    /// Verifies signature and expiry, and that the token is of the expected kind.
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        let claims = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })?;

        if claims.kind != expected {
            return Err(AuthError::TokenInvalid);
        }

        Ok(claims)
    }
}

/// Identity proven by a valid access token. Carries the claims as signed; the
/// live user record is consulted separately when a decision depends on it.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: GlobalRole,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = state.sessions().verify(token)?;

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: Arc::new(b"unit-test-secret".to_vec()),
            access_ttl_secs: 3600,
            refresh_ttl_secs: 7 * 24 * 3600,
        }
    }

    #[test]
    fn access_token_roundtrip() {
        let cfg = config();
        let user_id = Uuid::new_v4();
        let signed = cfg.encode(TokenKind::Access, user_id, "ada@example.com", GlobalRole::Admin).unwrap();

        let claims = cfg.decode(&signed.token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, GlobalRole::Admin);
        assert_eq!(claims.email, "ada@example.com");
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let cfg = config();
        let signed = cfg.encode(TokenKind::Refresh, Uuid::new_v4(), "a@b.io", GlobalRole::User).unwrap();

        assert_eq!(cfg.decode(&signed.token, TokenKind::Access).unwrap_err(), AuthError::TokenInvalid);
        assert!(cfg.decode(&signed.token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn expired_token_is_distinguished_from_tampered() {
        let mut cfg = config();
        cfg.access_ttl_secs = -120;
        let expired = cfg.encode(TokenKind::Access, Uuid::new_v4(), "a@b.io", GlobalRole::User).unwrap();
        assert_eq!(cfg.decode(&expired.token, TokenKind::Access).unwrap_err(), AuthError::TokenExpired);

        let other = JwtConfig {
            secret: Arc::new(b"another-secret".to_vec()),
            ..config()
        };
        let foreign = other.encode(TokenKind::Access, Uuid::new_v4(), "a@b.io", GlobalRole::User).unwrap();
        assert_eq!(cfg.decode(&foreign.token, TokenKind::Access).unwrap_err(), AuthError::TokenInvalid);
        assert_eq!(cfg.decode("not-a-jwt", TokenKind::Access).unwrap_err(), AuthError::TokenInvalid);
    }

    #[test]
    fn tokens_minted_together_differ() {
        let cfg = config();
        let id = Uuid::new_v4();
        let a = cfg.encode(TokenKind::Refresh, id, "a@b.io", GlobalRole::User).unwrap();
        let b = cfg.encode(TokenKind::Refresh, id, "a@b.io", GlobalRole::User).unwrap();
        assert_ne!(a.token, b.token);
    }
}
