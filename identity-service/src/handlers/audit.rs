//! Audit log query.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use service_core::error::AppError;

use crate::{
    dtos::{AuditParams, ErrorResponse},
    middleware::BearerToken,
    models::{Action, AuditEntryView, AuditQuery, ResourceKind},
    AppState,
};

/// List audit entries for a project, newest first, 100 per page
#[utoipa::path(
    get,
    path = "/api/v1/project/{project}/audit",
    params(("project" = String, Path, description = "Project name"), AuditParams),
    responses(
        (status = 200, description = "One page of audit entries", body = Vec<AuditEntryView>),
        (status = 400, description = "from_date is after to_date", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "No project read grant", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Audit",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, bearer, params), fields(project = %project, offset = params.offset))]
pub async fn list_audit_entries(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(params): Query<AuditParams>,
    bearer: BearerToken,
) -> Result<Json<Vec<AuditEntryView>>, AppError> {
    state.gate.authorize(
        bearer.token(),
        Some(&project),
        ResourceKind::Project,
        Action::Read,
    )?;
    state.projects.get(&project).await?;

    let query = AuditQuery::window(params.from_date, params.to_date, params.offset, Utc::now());
    if query.from > query.to {
        return Err(AppError::ValidationFailed(
            "from_date: must not be after to_date".to_string(),
        ));
    }

    let entries = state.audit.query(&project, &query).await.map_err(|e| {
        tracing::error!(error = %e, "Audit query failed");
        AppError::Unexpected(e)
    })?;

    Ok(Json(entries.into_iter().map(AuditEntryView::from).collect()))
}
