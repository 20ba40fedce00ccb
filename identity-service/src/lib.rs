pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, Request},
    middleware::from_fn,
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::IdentityConfig;
use crate::dtos::HealthResponse;
use crate::models::{Client, Role, User};
use crate::services::{
    AuditRecorder, AuditSink, AuthorizationGate, JwtService, ProjectManager,
    ResourceLifecycleManager, ResourceStore, TokenService,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::project::list_projects,
        handlers::project::create_project,
        handlers::project::get_project,
        handlers::project::update_project,
        handlers::project::delete_project,
        handlers::client::list_clients,
        handlers::client::create_client,
        handlers::client::get_client,
        handlers::client::update_client,
        handlers::client::delete_client,
        handlers::user::list_users,
        handlers::user::create_user,
        handlers::user::get_user,
        handlers::user::update_user,
        handlers::user::delete_user,
        handlers::user::change_password,
        handlers::user::add_user_role,
        handlers::user::remove_user_role,
        handlers::role::list_roles,
        handlers::role::create_role,
        handlers::role::get_role,
        handlers::role::update_role,
        handlers::role::delete_role,
        handlers::audit::list_audit_entries,
        handlers::token::issue_token,
        handlers::token::revoke_token,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::TokenRequest,
            dtos::RevokeRequest,
            dtos::ChangePasswordRequest,
            dtos::HealthResponse,
            services::AuthType,
            services::TokenPair,
            models::Project,
            models::ProjectSpec,
            models::ProjectDelta,
            models::TokenPolicy,
            models::SigningAlgorithm,
            models::AccessType,
            models::ClientSpec,
            models::ClientDelta,
            models::ClientView,
            models::UserSpec,
            models::UserDelta,
            models::UserView,
            models::Role,
            models::RoleType,
            models::RoleSpec,
            models::RoleDelta,
            models::Action,
            models::ResourceKind,
            models::AuditEntryView,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Project", description = "Tenant management"),
        (name = "Client", description = "Per-project client registrations"),
        (name = "User", description = "Per-project users and their roles"),
        (name = "Role", description = "Per-project roles"),
        (name = "Token", description = "Token issuance and revocation"),
        (name = "Audit", description = "Record of mutating requests"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub store: Arc<dyn ResourceStore>,
    pub gate: AuthorizationGate,
    pub audit: AuditRecorder,
    pub projects: ProjectManager,
    pub clients: ResourceLifecycleManager<Client>,
    pub users: ResourceLifecycleManager<User>,
    pub roles: ResourceLifecycleManager<Role>,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(
        config: IdentityConfig,
        store: Arc<dyn ResourceStore>,
        audit_sink: Arc<dyn AuditSink>,
        jwt: JwtService,
    ) -> Self {
        let admin_project = config.admin.project.clone();
        Self {
            gate: AuthorizationGate::new(jwt.clone()),
            audit: AuditRecorder::new(audit_sink),
            projects: ProjectManager::new(store.clone(), admin_project.clone()),
            clients: ResourceLifecycleManager::new(store.clone()),
            users: ResourceLifecycleManager::new(store.clone()),
            roles: ResourceLifecycleManager::new(store.clone()),
            tokens: TokenService::new(store.clone(), jwt, admin_project),
            store,
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let project_routes = Router::new()
        .route(
            "/api/v1/project",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/api/v1/project/:project",
            get(handlers::get_project)
                .put(handlers::update_project)
                .delete(handlers::delete_project),
        )
        .route(
            "/api/v1/project/:project/audit",
            get(handlers::list_audit_entries),
        );

    let resource_routes = Router::new()
        .route(
            "/api/v1/project/:project/client",
            get(handlers::list_clients).post(handlers::create_client),
        )
        .route(
            "/api/v1/project/:project/client/:id",
            get(handlers::get_client)
                .put(handlers::update_client)
                .delete(handlers::delete_client),
        )
        .route(
            "/api/v1/project/:project/user",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/api/v1/project/:project/user/:id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route(
            "/api/v1/project/:project/user/:id/change-password",
            post(handlers::change_password),
        )
        .route(
            "/api/v1/project/:project/user/:id/role/:role",
            post(handlers::add_user_role).delete(handlers::remove_user_role),
        )
        .route(
            "/api/v1/project/:project/role",
            get(handlers::list_roles).post(handlers::create_role),
        )
        .route(
            "/api/v1/project/:project/role/:id",
            get(handlers::get_role)
                .put(handlers::update_role)
                .delete(handlers::delete_role),
        );

    let token_routes = Router::new()
        .route("/api/v1/project/:project/token", post(handlers::issue_token))
        .route(
            "/api/v1/project/:project/openid-connect/revoke",
            post(handlers::revoke_token),
        );

    let origins = &state.config.security.allowed_origins;
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        }))
    };

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(project_routes)
        .merge(resource_routes)
        .merge(token_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allow_origin)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        )
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Store is unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    state.store.ping().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::UpstreamUnavailable("store is unreachable".to_string())
    })?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: state.config.service_version.clone(),
        store: "up".to_string(),
    }))
}
