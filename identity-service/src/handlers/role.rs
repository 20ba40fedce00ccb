use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{ErrorResponse, ListParams},
    middleware::BearerToken,
    models::{Action, Role, RoleDelta, RoleSpec, ResourceKind},
    utils::ValidatedJson,
    AppState,
};

/// List roles in a project
#[utoipa::path(
    get,
    path = "/api/v1/project/{project}/role",
    params(("project" = String, Path, description = "Project name"), ListParams),
    responses(
        (status = 200, description = "Roles in the project", body = Vec<Role>),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No role read grant", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Role",
    security(("bearer_auth" = []))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(params): Query<ListParams>,
    bearer: BearerToken,
) -> Result<Json<Vec<Role>>, AppError> {
    state.gate.authorize(
        bearer.token(),
        Some(&project),
        ResourceKind::Role,
        Action::Read,
    )?;

    let roles = state.roles.list(&project, &params.into()).await?;
    Ok(Json(roles))
}

/// Create a custom role
#[utoipa::path(
    post,
    path = "/api/v1/project/{project}/role",
    params(("project" = String, Path, description = "Project name")),
    request_body = RoleSpec,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No role write grant", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse),
        (status = 409, description = "Role name already used in this project", body = ErrorResponse)
    ),
    tag = "Role",
    security(("bearer_auth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    Path(project): Path<String>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
    payload: Result<ValidatedJson<RoleSpec>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    state
        .audit
        .begin(&project, ResourceKind::Role, method.as_str(), uri.path())
        .run(async {
            state.gate.authorize(
                bearer.token(),
                Some(&project),
                ResourceKind::Role,
                Action::Write,
            )?;
            let ValidatedJson(spec) = payload?;

            let role = state.roles.create(&project, spec).await?;
            Ok::<_, AppError>((StatusCode::CREATED, Json(role)))
        })
        .await
}

/// Get a role
#[utoipa::path(
    get,
    path = "/api/v1/project/{project}/role/{id}",
    params(
        ("project" = String, Path, description = "Project name"),
        ("id" = String, Path, description = "Role name")
    ),
    responses(
        (status = 200, description = "Role found", body = Role),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No role read grant", body = ErrorResponse),
        (status = 404, description = "Project or role not found", body = ErrorResponse)
    ),
    tag = "Role",
    security(("bearer_auth" = []))
)]
pub async fn get_role(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
    bearer: BearerToken,
) -> Result<Json<Role>, AppError> {
    state.gate.authorize(
        bearer.token(),
        Some(&project),
        ResourceKind::Role,
        Action::Read,
    )?;

    let role = state.roles.get(&project, &id).await?;
    Ok(Json(role))
}

/// Update a custom role. System roles are read-only.
#[utoipa::path(
    put,
    path = "/api/v1/project/{project}/role/{id}",
    params(
        ("project" = String, Path, description = "Project name"),
        ("id" = String, Path, description = "Role name")
    ),
    request_body = RoleDelta,
    responses(
        (status = 200, description = "Role updated", body = Role),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No role write grant, or a system role", body = ErrorResponse),
        (status = 404, description = "Project or role not found", body = ErrorResponse)
    ),
    tag = "Role",
    security(("bearer_auth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
    payload: Result<ValidatedJson<RoleDelta>, AppError>,
) -> Result<Json<Role>, AppError> {
    state
        .audit
        .begin(&project, ResourceKind::Role, method.as_str(), uri.path())
        .run(async {
            state.gate.authorize(
                bearer.token(),
                Some(&project),
                ResourceKind::Role,
                Action::Write,
            )?;
            let ValidatedJson(delta) = payload?;

            let role = state.roles.update(&project, &id, delta).await?;
            Ok::<_, AppError>(Json(role))
        })
        .await
}

/// Delete a custom role
#[utoipa::path(
    delete,
    path = "/api/v1/project/{project}/role/{id}",
    params(
        ("project" = String, Path, description = "Project name"),
        ("id" = String, Path, description = "Role name")
    ),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No role write grant, or a system role", body = ErrorResponse),
        (status = 404, description = "Project or role not found", body = ErrorResponse)
    ),
    tag = "Role",
    security(("bearer_auth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
) -> Result<StatusCode, AppError> {
    state
        .audit
        .begin(&project, ResourceKind::Role, method.as_str(), uri.path())
        .run(async {
            state.gate.authorize(
                bearer.token(),
                Some(&project),
                ResourceKind::Role,
                Action::Write,
            )?;

            state.roles.delete(&project, &id).await?;
            Ok::<_, AppError>(StatusCode::NO_CONTENT)
        })
        .await
}
