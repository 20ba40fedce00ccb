//! Servers for identity-client integration tests, bound to ephemeral ports.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use identity_client::{
    ClientConfig, CredentialLifecycleManager, CredentialStore, HttpTokenEndpoint, ResourceClient,
};
use identity_service::{
    build_router,
    config::{
        AdminConfig, DatabaseConfig, Environment, IdentityConfig, JwtConfig, SecurityConfig,
        StoreBackend,
    },
    services::{ensure_admin, JwtService, MemoryAuditSink, MemoryStore, ResourceStore},
    AppState,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const ADMIN_PROJECT: &str = "master";
pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn service_config() -> IdentityConfig {
    IdentityConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "identity-service".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        store_backend: StoreBackend::Memory,
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: "client-test-secret-that-is-long-enough".to_string(),
            issuer: "identity-client-test".to_string(),
            private_key_path: None,
            public_key_path: None,
        },
        admin: AdminConfig {
            project: ADMIN_PROJECT.to_string(),
            user: ADMIN_USER.to_string(),
            password: ADMIN_PASSWORD.to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["*".to_string()],
        },
    }
}

/// Starts a real identity-service backed by memory and returns its base URL.
pub async fn spawn_service() -> String {
    let config = service_config();
    let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
    ensure_admin(store.clone(), &config.admin).await.unwrap();

    let jwt = JwtService::new(&config.jwt).unwrap();
    let state = AppState::new(config, store, Arc::new(MemoryAuditSink::new()), jwt);
    serve(build_router(state)).await
}

/// Builds a manager and resource client against `server`, keeping state in `dir`.
pub async fn client_for(
    server: &str,
    dir: &Path,
    project: &str,
) -> (Arc<CredentialLifecycleManager>, ResourceClient) {
    let mut config = ClientConfig::with_server(dir, server);
    config.project = project.to_string();

    let endpoint = Arc::new(HttpTokenEndpoint::new(&config).unwrap());
    let manager = Arc::new(
        CredentialLifecycleManager::open(
            endpoint,
            CredentialStore::new(config.secret_path()),
            config.project.clone(),
        )
        .await,
    );
    let api = ResourceClient::new(&config, manager.clone()).unwrap();
    (manager, api)
}

/// Token server stand-in that counts exchanges and answers slowly.
#[derive(Clone, Default)]
pub struct TokenCounter {
    pub password: Arc<AtomicUsize>,
    pub refresh: Arc<AtomicUsize>,
    pub revoke: Arc<AtomicUsize>,
}

impl TokenCounter {
    pub fn refreshes(&self) -> usize {
        self.refresh.load(Ordering::SeqCst)
    }
}

async fn mock_token(
    State(counter): State<TokenCounter>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    match body["auth_type"].as_str() {
        Some("password") => {
            let n = counter.password.fetch_add(1, Ordering::SeqCst);
            // Issued already expired so the next use must refresh.
            (
                StatusCode::OK,
                Json(json!({
                    "access_token": format!("password-{n}"),
                    "access_expires_in": 0,
                    "refresh_token": format!("refresh-{n}"),
                    "refresh_expires_in": 3600,
                })),
            )
        }
        Some("refresh") => {
            let n = counter.refresh.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            (
                StatusCode::OK,
                Json(json!({
                    "access_token": format!("refreshed-{n}"),
                    "access_expires_in": 300,
                    "refresh_token": format!("rotated-{n}"),
                    "refresh_expires_in": 3600,
                })),
            )
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Validation failed" })),
        ),
    }
}

async fn mock_revoke(State(counter): State<TokenCounter>) -> StatusCode {
    counter.revoke.fetch_add(1, Ordering::SeqCst);
    StatusCode::SERVICE_UNAVAILABLE
}

/// Starts the counting token server and returns its base URL.
pub async fn spawn_token_mock(counter: TokenCounter) -> String {
    let router = Router::new()
        .route("/api/v1/project/:project/token", post(mock_token))
        .route(
            "/api/v1/project/:project/openid-connect/revoke",
            post(mock_revoke),
        )
        .with_state(counter);
    serve(router).await
}
