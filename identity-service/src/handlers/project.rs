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
    models::{Action, Project, ProjectDelta, ProjectSpec, ResourceKind},
    utils::ValidatedJson,
    AppState,
};

/// List projects
#[utoipa::path(
    get,
    path = "/api/v1/project",
    params(ListParams),
    responses(
        (status = 200, description = "Projects visible to a global reader", body = Vec<Project>),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No global project read grant", body = ErrorResponse)
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    bearer: BearerToken,
) -> Result<Json<Vec<Project>>, AppError> {
    state
        .gate
        .authorize(bearer.token(), None, ResourceKind::Project, Action::Read)?;

    let projects = state.projects.list(&params.into()).await?;
    Ok(Json(projects))
}

/// Create a project
#[utoipa::path(
    post,
    path = "/api/v1/project",
    request_body = ProjectSpec,
    responses(
        (status = 201, description = "Project created with its default roles", body = Project),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No global project write grant", body = ErrorResponse),
        (status = 409, description = "Project already exists", body = ErrorResponse)
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn create_project(
    State(state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
    payload: Result<ValidatedJson<ProjectSpec>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    state
        .audit
        .begin(
            state.projects.admin_project(),
            ResourceKind::Project,
            method.as_str(),
            uri.path(),
        )
        .run(async {
            state
                .gate
                .authorize(bearer.token(), None, ResourceKind::Project, Action::Write)?;
            let ValidatedJson(spec) = payload?;

            let project = state.projects.create(spec).await?;
            Ok::<_, AppError>((StatusCode::CREATED, Json(project)))
        })
        .await
}

/// Get a project
#[utoipa::path(
    get,
    path = "/api/v1/project/{project}",
    params(("project" = String, Path, description = "Project name")),
    responses(
        (status = 200, description = "Project found", body = Project),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No project read grant", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(project): Path<String>,
    bearer: BearerToken,
) -> Result<Json<Project>, AppError> {
    state.gate.authorize(
        bearer.token(),
        Some(&project),
        ResourceKind::Project,
        Action::Read,
    )?;

    Ok(Json(state.projects.get(&project).await?))
}

/// Update a project's token policy
#[utoipa::path(
    put,
    path = "/api/v1/project/{project}",
    params(("project" = String, Path, description = "Project name")),
    request_body = ProjectDelta,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No project write grant", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn update_project(
    State(state): State<AppState>,
    Path(project): Path<String>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
    payload: Result<ValidatedJson<ProjectDelta>, AppError>,
) -> Result<Json<Project>, AppError> {
    state
        .audit
        .begin(&project, ResourceKind::Project, method.as_str(), uri.path())
        .run(async {
            state.gate.authorize(
                bearer.token(),
                Some(&project),
                ResourceKind::Project,
                Action::Write,
            )?;
            let ValidatedJson(delta) = payload?;

            let updated = state.projects.update(&project, delta).await?;
            Ok::<_, AppError>(Json(updated))
        })
        .await
}

/// Delete a project and everything in it
#[utoipa::path(
    delete,
    path = "/api/v1/project/{project}",
    params(("project" = String, Path, description = "Project name")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No global project write grant, or the administrative project", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Path(project): Path<String>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
) -> Result<StatusCode, AppError> {
    state
        .audit
        .begin(
            state.projects.admin_project(),
            ResourceKind::Project,
            method.as_str(),
            uri.path(),
        )
        .run(async {
            state
                .gate
                .authorize(bearer.token(), None, ResourceKind::Project, Action::Write)?;

            state.projects.delete(&project).await?;
            Ok::<_, AppError>(StatusCode::NO_CONTENT)
        })
        .await
}
