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
    models::{Action, ClientDelta, ClientSpec, ClientView, ResourceKind},
    utils::ValidatedJson,
    AppState,
};

/// List clients in a project (secrets redacted)
#[utoipa::path(
    get,
    path = "/api/v1/project/{project}/client",
    params(("project" = String, Path, description = "Project name"), ListParams),
    responses(
        (status = 200, description = "Clients in the project", body = Vec<ClientView>),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No client read grant", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Client",
    security(("bearer_auth" = []))
)]
pub async fn list_clients(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(params): Query<ListParams>,
    bearer: BearerToken,
) -> Result<Json<Vec<ClientView>>, AppError> {
    state.gate.authorize(
        bearer.token(),
        Some(&project),
        ResourceKind::Client,
        Action::Read,
    )?;

    let clients = state.clients.list(&project, &params.into()).await?;
    Ok(Json(clients.into_iter().map(ClientView::from).collect()))
}

/// Create a client. The response is the only place the secret is returned.
#[utoipa::path(
    post,
    path = "/api/v1/project/{project}/client",
    params(("project" = String, Path, description = "Project name")),
    request_body = ClientSpec,
    responses(
        (status = 201, description = "Client created", body = ClientView),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No client write grant", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse),
        (status = 409, description = "Client id already used in this project", body = ErrorResponse)
    ),
    tag = "Client",
    security(("bearer_auth" = []))
)]
pub async fn create_client(
    State(state): State<AppState>,
    Path(project): Path<String>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
    payload: Result<ValidatedJson<ClientSpec>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    state
        .audit
        .begin(&project, ResourceKind::Client, method.as_str(), uri.path())
        .run(async {
            state.gate.authorize(
                bearer.token(),
                Some(&project),
                ResourceKind::Client,
                Action::Write,
            )?;
            let ValidatedJson(spec) = payload?;

            let client = state.clients.create(&project, spec).await?;
            Ok::<_, AppError>((StatusCode::CREATED, Json(ClientView::revealed(client))))
        })
        .await
}

/// Get a client (secret redacted)
#[utoipa::path(
    get,
    path = "/api/v1/project/{project}/client/{id}",
    params(
        ("project" = String, Path, description = "Project name"),
        ("id" = String, Path, description = "Client id")
    ),
    responses(
        (status = 200, description = "Client found", body = ClientView),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No client read grant", body = ErrorResponse),
        (status = 404, description = "Project or client not found", body = ErrorResponse)
    ),
    tag = "Client",
    security(("bearer_auth" = []))
)]
pub async fn get_client(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
    bearer: BearerToken,
) -> Result<Json<ClientView>, AppError> {
    state.gate.authorize(
        bearer.token(),
        Some(&project),
        ResourceKind::Client,
        Action::Read,
    )?;

    let client = state.clients.get(&project, &id).await?;
    Ok(Json(client.into()))
}

/// Update a client
#[utoipa::path(
    put,
    path = "/api/v1/project/{project}/client/{id}",
    params(
        ("project" = String, Path, description = "Project name"),
        ("id" = String, Path, description = "Client id")
    ),
    request_body = ClientDelta,
    responses(
        (status = 200, description = "Client updated", body = ClientView),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No client write grant", body = ErrorResponse),
        (status = 404, description = "Project or client not found", body = ErrorResponse)
    ),
    tag = "Client",
    security(("bearer_auth" = []))
)]
pub async fn update_client(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
    payload: Result<ValidatedJson<ClientDelta>, AppError>,
) -> Result<Json<ClientView>, AppError> {
    state
        .audit
        .begin(&project, ResourceKind::Client, method.as_str(), uri.path())
        .run(async {
            state.gate.authorize(
                bearer.token(),
                Some(&project),
                ResourceKind::Client,
                Action::Write,
            )?;
            let ValidatedJson(delta) = payload?;

            let client = state.clients.update(&project, &id, delta).await?;
            Ok::<_, AppError>(Json(ClientView::from(client)))
        })
        .await
}

/// Delete a client
#[utoipa::path(
    delete,
    path = "/api/v1/project/{project}/client/{id}",
    params(
        ("project" = String, Path, description = "Project name"),
        ("id" = String, Path, description = "Client id")
    ),
    responses(
        (status = 204, description = "Client deleted"),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No client write grant", body = ErrorResponse),
        (status = 404, description = "Project or client not found", body = ErrorResponse)
    ),
    tag = "Client",
    security(("bearer_auth" = []))
)]
pub async fn delete_client(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    bearer: BearerToken,
) -> Result<StatusCode, AppError> {
    state
        .audit
        .begin(&project, ResourceKind::Client, method.as_str(), uri.path())
        .run(async {
            state.gate.authorize(
                bearer.token(),
                Some(&project),
                ResourceKind::Client,
                Action::Write,
            )?;

            state.clients.delete(&project, &id).await?;
            Ok::<_, AppError>(StatusCode::NO_CONTENT)
        })
        .await
}
