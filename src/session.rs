//! Session manager: login, token verification, refresh and logout.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::authz::Principal;
use crate::db::users;
use crate::errors::{AppResult, AuthError};
use crate::jwt::{AuthUser, Claims, JwtConfig, SignedToken, TokenKind};
use crate::models::user::{normalize_email, AccessGrant, DbUser, LoginResponse, User};
use crate::utils::{verify_against_dummy, verify_password};

/// Refresh tokens are stored as the hex SHA-256 of the raw token.
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub struct SessionManager<'a> {
    pool: &'a SqlitePool,
    jwt: &'a JwtConfig,
}

impl<'a> SessionManager<'a> {
    pub fn new(pool: &'a SqlitePool, jwt: &'a JwtConfig) -> Self {
        Self { pool, jwt }
    }

    /// Checks the password first so that a suspended account is only
    /// revealed to someone who knows it.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<LoginResponse> {
        let email = normalize_email(email);

        let Some(db_user) = users::find_by_email(self.pool, &email).await? else {
            verify_against_dummy(password);
            tracing::info!("login rejected: unknown email");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !verify_password(password, &db_user.password_hash)? {
            tracing::info!(user_id = %db_user.id, "login rejected: bad password");
            return Err(AuthError::InvalidCredentials.into());
        }

        if db_user.suspended {
            tracing::info!(user_id = %db_user.id, "login rejected: account suspended");
            return Err(AuthError::AccountSuspended.into());
        }

        let user = User::try_from(db_user)?;
        let access = self.mint(TokenKind::Access, &user)?;
        let refresh = self.mint(TokenKind::Refresh, &user)?;

        users::store_refresh_token(self.pool, user.id, &hash_refresh_token(&refresh.token), refresh.expires_at)
            .await?;

        tracing::info!(user_id = %user.id, "user logged in");

        Ok(LoginResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_at: access.expires_at,
            user,
        })
    }

    /// Stateless check of an access token.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.jwt.decode(token, TokenKind::Access)
    }

    /// Trades a stored refresh token for a new access token. The refresh
    /// token itself is not rotated.
    pub async fn refresh(&self, presented: Option<&str>) -> AppResult<AccessGrant> {
        let token = presented
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let db_user = users::find_by_refresh_hash(self.pool, &hash_refresh_token(token))
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if let Err(err) = self.check_refresh(token, &db_user) {
            users::clear_refresh_token(self.pool, db_user.id).await?;
            tracing::info!(user_id = %db_user.id, reason = ?err, "refresh rejected, stored token cleared");
            return Err(err.into());
        }

        let user = User::try_from(db_user)?;
        let access = self.mint(TokenKind::Access, &user)?;

        Ok(AccessGrant {
            access_token: access.token,
            expires_at: access.expires_at,
        })
    }

    fn check_refresh(&self, token: &str, db_user: &DbUser) -> Result<(), AuthError> {
        let claims = self.jwt.decode(token, TokenKind::Refresh)?;
        if claims.sub != db_user.id {
            return Err(AuthError::TokenInvalid);
        }
        if let Some(expires_at) = db_user.refresh_token_expires_at {
            if expires_at <= chrono::Utc::now() {
                return Err(AuthError::TokenExpired);
            }
        }
        if db_user.suspended {
            return Err(AuthError::AccountSuspended);
        }
        Ok(())
    }

    /// Logout. Outstanding access tokens stay valid until they expire.
    pub async fn invalidate(&self, user_id: uuid::Uuid) -> AppResult<()> {
        users::clear_refresh_token(self.pool, user_id).await?;
        tracing::info!(user_id = %user_id, "user logged out");
        Ok(())
    }

    /// Resolves the caller against the live user record, so role changes and
    /// suspensions apply before the access token expires.
    pub async fn load_principal(&self, auth: &AuthUser) -> AppResult<Principal> {
        let db_user = users::find_by_id(self.pool, auth.user_id)
            .await?
            .ok_or(AuthError::UnknownAccount)?;

        if db_user.suspended {
            return Err(AuthError::AccountSuspended.into());
        }

        let user = User::try_from(db_user)?;
        Ok(Principal::from(&user))
    }

    fn mint(&self, kind: TokenKind, user: &User) -> AppResult<SignedToken> {
        self.jwt.encode(kind, user.id, &user.email, user.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_hash_is_stable_hex() {
        let a = hash_refresh_token("token-value");
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_refresh_token("token-value"));
        assert_ne!(a, hash_refresh_token("token-value2"));
    }
}
