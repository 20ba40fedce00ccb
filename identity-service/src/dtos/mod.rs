use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::services::AuthType;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Not found")]
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TokenRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: String,
    /// Password, or the refresh token when `auth_type` is `refresh`
    #[validate(length(min = 1, message = "must not be empty"))]
    pub secret: String,
    pub auth_type: AuthType,
}

/// Form body of the revoke endpoint.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RevokeRequest {
    pub token_type_hint: Option<String>,
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 8, max = 128, message = "must be 8 to 128 characters"))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditParams {
    /// Start of the window (RFC 3339). Defaults to 24 hours before `to_date`.
    pub from_date: Option<DateTime<Utc>>,
    /// End of the window (RFC 3339). Defaults to now.
    pub to_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Only return resources whose id starts with this prefix
    pub prefix: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub store: String,
}
