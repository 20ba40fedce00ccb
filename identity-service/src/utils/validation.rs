use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use validator::Validate;

use crate::services::ServiceError;

/// Project and client identifiers.
pub static RESOURCE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9._-]{3,63}$").expect("resource name pattern"));

/// JSON body that has been parsed and validated.
///
/// Malformed JSON, unknown enum values and failed field rules all reject
/// with `ValidationFailed`. Handlers that must audit rejected bodies take
/// `Result<ValidatedJson<T>, AppError>` so the rejection reaches them.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::ValidationFailed(e.body_text()))?;

        value
            .validate()
            .map_err(|e| AppError::from(ServiceError::from(e)))?;

        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_name_pattern() {
        for ok in ["acme", "cli1", "my-app.v2", "a_b_c"] {
            assert!(RESOURCE_NAME.is_match(ok), "{ok} should match");
        }
        for bad in ["abc", "1acme", "Acme", "has space", "a/bcd", ""] {
            assert!(!RESOURCE_NAME.is_match(bad), "{bad} should not match");
        }
        assert!(!RESOURCE_NAME.is_match(&format!("a{}", "b".repeat(64))));
    }
}
