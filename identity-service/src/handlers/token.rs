use axum::{
    extract::{Path, State},
    http::StatusCode,
    Form, Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{ErrorResponse, RevokeRequest, TokenRequest},
    services::TokenPair,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Exchange a password or refresh token for a token pair
#[utoipa::path(
    post,
    path = "/api/v1/project/{project}/token",
    params(("project" = String, Path, description = "Project name")),
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 400, description = "Malformed request or unknown auth_type", body = ErrorResponse),
        (status = 401, description = "Bad password, or refresh token expired or revoked", body = ErrorResponse),
        (status = 404, description = "Unknown project or user", body = ErrorResponse)
    ),
    tag = "Token"
)]
pub async fn issue_token(
    State(state): State<AppState>,
    Path(project): Path<String>,
    ValidatedJson(req): ValidatedJson<TokenRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let pair = state
        .tokens
        .issue(&project, &req.name, Password::new(req.secret), req.auth_type)
        .await?;
    Ok(Json(pair))
}

/// Revoke a refresh token
///
/// Unknown or already revoked tokens are accepted.
#[utoipa::path(
    post,
    path = "/api/v1/project/{project}/openid-connect/revoke",
    params(("project" = String, Path, description = "Project name")),
    request_body(content = RevokeRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token no longer usable"),
        (status = 500, description = "Store failure", body = ErrorResponse)
    ),
    tag = "Token"
)]
pub async fn revoke_token(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Form(req): Form<RevokeRequest>,
) -> Result<StatusCode, AppError> {
    if let Some(hint) = req.token_type_hint.as_deref() {
        if hint != "refresh_token" {
            tracing::debug!(project = %project, hint = %hint, "Unsupported token type hint");
        }
    }

    state.tokens.revoke(&project, &req.token).await?;
    Ok(StatusCode::OK)
}
