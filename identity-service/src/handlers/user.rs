use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{ChangePasswordRequest, ErrorResponse, ListParams},
    middleware::BearerToken,
    models::{Action, ResourceKind, UserDelta, UserSpec, UserView},
    utils::ValidatedJson,
    AppState,
};

/// List users in a project
#[utoipa::path(
    get,
    path = "/api/v1/project/{project}/user",
    params(("project" = String, Path, description = "Project name"), ListParams),
    responses(
        (status = 200, description = "Users in the project", body = Vec<UserView>),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No user read grant", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(params): Query<ListParams>,
    bearer: BearerToken,
) -> Result<Json<Vec<UserView>>, AppError> {
    state
        .gate
        .authorize(bearer.token(), Some(&project), ResourceKind::User, Action::Read)?;

    let users = state.users.list(&project, &params.into()).await?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/v1/project/{project}/user",
    params(("project" = String, Path, description = "Project name")),
    request_body = UserSpec,
    responses(
        (status = 201, description = "User created", body = UserView),
        (status = 400, description = "Validation error or unknown role", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No user write grant", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse),
        (status = 409, description = "User name already used in this project", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    Path(project): Path<String>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
    payload: Result<ValidatedJson<UserSpec>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    state
        .audit
        .begin(&project, ResourceKind::User, method.as_str(), uri.path())
        .run(async {
            state.gate.authorize(
                bearer.token(),
                Some(&project),
                ResourceKind::User,
                Action::Write,
            )?;
            let ValidatedJson(spec) = payload?;

            let user = state.users.create(&project, spec).await?;
            Ok::<_, AppError>((StatusCode::CREATED, Json(UserView::from(user))))
        })
        .await
}

/// Get a user
#[utoipa::path(
    get,
    path = "/api/v1/project/{project}/user/{id}",
    params(
        ("project" = String, Path, description = "Project name"),
        ("id" = String, Path, description = "User name")
    ),
    responses(
        (status = 200, description = "User found", body = UserView),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No user read grant", body = ErrorResponse),
        (status = 404, description = "Project or user not found", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
    bearer: BearerToken,
) -> Result<Json<UserView>, AppError> {
    state
        .gate
        .authorize(bearer.token(), Some(&project), ResourceKind::User, Action::Read)?;

    let user = state.users.get(&project, &id).await?;
    Ok(Json(user.into()))
}

/// Update a user's password or role list
#[utoipa::path(
    put,
    path = "/api/v1/project/{project}/user/{id}",
    params(
        ("project" = String, Path, description = "Project name"),
        ("id" = String, Path, description = "User name")
    ),
    request_body = UserDelta,
    responses(
        (status = 200, description = "User updated", body = UserView),
        (status = 400, description = "Validation error or unknown role", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No user write grant", body = ErrorResponse),
        (status = 404, description = "Project or user not found", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
    payload: Result<ValidatedJson<UserDelta>, AppError>,
) -> Result<Json<UserView>, AppError> {
    state
        .audit
        .begin(&project, ResourceKind::User, method.as_str(), uri.path())
        .run(async {
            state.gate.authorize(
                bearer.token(),
                Some(&project),
                ResourceKind::User,
                Action::Write,
            )?;
            let ValidatedJson(delta) = payload?;

            let user = state.users.update(&project, &id, delta).await?;
            Ok::<_, AppError>(Json(UserView::from(user)))
        })
        .await
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/v1/project/{project}/user/{id}",
    params(
        ("project" = String, Path, description = "Project name"),
        ("id" = String, Path, description = "User name")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No user write grant", body = ErrorResponse),
        (status = 404, description = "Project or user not found", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
) -> Result<StatusCode, AppError> {
    state
        .audit
        .begin(&project, ResourceKind::User, method.as_str(), uri.path())
        .run(async {
            state.gate.authorize(
                bearer.token(),
                Some(&project),
                ResourceKind::User,
                Action::Write,
            )?;

            state.users.delete(&project, &id).await?;
            Ok::<_, AppError>(StatusCode::NO_CONTENT)
        })
        .await
}

/// Replace a user's password
#[utoipa::path(
    post,
    path = "/api/v1/project/{project}/user/{id}/change-password",
    params(
        ("project" = String, Path, description = "Project name"),
        ("id" = String, Path, description = "User name")
    ),
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Password does not meet the length rules", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No user write grant", body = ErrorResponse),
        (status = 404, description = "Project or user not found", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
    payload: Result<ValidatedJson<ChangePasswordRequest>, AppError>,
) -> Result<StatusCode, AppError> {
    state
        .audit
        .begin(&project, ResourceKind::User, method.as_str(), uri.path())
        .run(async {
            state.gate.authorize(
                bearer.token(),
                Some(&project),
                ResourceKind::User,
                Action::Write,
            )?;
            let ValidatedJson(req) = payload?;

            let delta = UserDelta {
                password: Some(req.password),
                roles: None,
            };
            state.users.update(&project, &id, delta).await?;
            Ok::<_, AppError>(StatusCode::NO_CONTENT)
        })
        .await
}

/// Grant an existing role to a user
#[utoipa::path(
    post,
    path = "/api/v1/project/{project}/user/{id}/role/{role}",
    params(
        ("project" = String, Path, description = "Project name"),
        ("id" = String, Path, description = "User name"),
        ("role" = String, Path, description = "Role name")
    ),
    responses(
        (status = 200, description = "Role added", body = UserView),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No user write grant", body = ErrorResponse),
        (status = 404, description = "Project, user or role not found", body = ErrorResponse),
        (status = 409, description = "User already holds the role", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn add_user_role(
    State(state): State<AppState>,
    Path((project, id, role)): Path<(String, String, String)>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
) -> Result<Json<UserView>, AppError> {
    state
        .audit
        .begin(&project, ResourceKind::User, method.as_str(), uri.path())
        .run(async {
            state.gate.authorize(
                bearer.token(),
                Some(&project),
                ResourceKind::User,
                Action::Write,
            )?;

            let user = state.users.add_role(&project, &id, &role).await?;
            Ok::<_, AppError>(Json(UserView::from(user)))
        })
        .await
}

/// Take a role away from a user
#[utoipa::path(
    delete,
    path = "/api/v1/project/{project}/user/{id}/role/{role}",
    params(
        ("project" = String, Path, description = "Project name"),
        ("id" = String, Path, description = "User name"),
        ("role" = String, Path, description = "Role name")
    ),
    responses(
        (status = 200, description = "Role removed", body = UserView),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No user write grant", body = ErrorResponse),
        (status = 404, description = "Project or user not found, or role not held", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn remove_user_role(
    State(state): State<AppState>,
    Path((project, id, role)): Path<(String, String, String)>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
) -> Result<Json<UserView>, AppError> {
    state
        .audit
        .begin(&project, ResourceKind::User, method.as_str(), uri.path())
        .run(async {
            state.gate.authorize(
                bearer.token(),
                Some(&project),
                ResourceKind::User,
                Action::Write,
            )?;

            let user = state.users.remove_role(&project, &id, &role).await?;
            Ok::<_, AppError>(Json(UserView::from(user)))
        })
        .await
}
