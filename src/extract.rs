use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::errors::AppError;
use crate::gate::API_KEY_HEADER;

/// JSON body that has been both deserialized and validated.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|err| AppError::validation(format!("unreadable request body: {err}")))?;

        parse_validated(&body).map(ValidatedJson)
    }
}

/// Parses and validates a raw body. Handlers that must authenticate before
/// looking at the payload take `Bytes` and call this themselves.
pub fn parse_validated<T>(body: &[u8]) -> Result<T, AppError>
where
    T: DeserializeOwned + Validate,
{
    let deserializer = &mut serde_json::Deserializer::from_slice(body);
    let value: T = serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        if path == "." {
            AppError::validation(format!("invalid JSON: {}", err.inner()))
        } else {
            AppError::validation(format!("invalid value at `{path}`: {}", err.inner()))
        }
    })?;

    value.validate().map_err(|errs| AppError::validation(describe(&errs)))?;
    Ok(value)
}

/// Flattens field errors into one line, ordered by field name.
fn describe(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let parts: Vec<String> = fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| match &err.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();

    if parts.is_empty() {
        "Validation failed".to_string()
    } else {
        parts.join("; ")
    }
}

/// The raw `x-api-key` header, if any. Blank values are treated as absent by
/// the gate, not here.
pub struct ApiKey(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ApiKey
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok(ApiKey(key))
    }
}
