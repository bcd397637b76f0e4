use std::sync::OnceLock;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand_core::OsRng;
use validator::ValidationError;

use crate::errors::AppError;

const MIN_PASSWORD_LENGTH: usize = 8;
const PASSWORD_SPECIALS: &str = "!@#$%^&*";

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::internal(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|err| AppError::internal(format!("invalid password hash: {err}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Burns the same hashing work as a real verification. Used when the account
/// does not exist so that lookups cannot be told apart by timing.
pub fn verify_against_dummy(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    let hash = DUMMY_HASH.get_or_init(|| hash_password("dummy-password-never-matches").ok());
    if let Some(hash) = hash {
        let _ = verify_password(password, hash);
    }
}

/// At least 8 characters with a digit, a lowercase letter, an uppercase letter
/// and one of `!@#$%^&*`.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let strong = password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c));

    if strong {
        return Ok(());
    }

    let mut err = ValidationError::new("password_strength");
    err.message = Some(
        "Password must be at least 8 characters long, include a number, an uppercase letter, and a special character."
            .into(),
    );
    Err(err)
}

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("S3cureP@ss").unwrap();
        assert_ne!(hash, "S3cureP@ss");
        assert!(verify_password("S3cureP@ss", &hash).unwrap());
        assert!(!verify_password("s3cureP@ss", &hash).unwrap());
    }

    #[test]
    fn password_policy() {
        assert!(validate_password_strength("S3cureP@ss").is_ok());
        assert!(validate_password_strength("Sh0rt!").is_err());
        assert!(validate_password_strength("nouppercase1!").is_err());
        assert!(validate_password_strength("NoDigits!!").is_err());
        assert!(validate_password_strength("NoSpecial123").is_err());
    }
}
