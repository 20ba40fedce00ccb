//! Shared setup for identity-service HTTP tests.
//!
//! Every test gets its own in-memory store and audit sink with the
//! administrative project already bootstrapped.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use identity_service::{
    build_router,
    config::{
        AdminConfig, DatabaseConfig, Environment, IdentityConfig, JwtConfig, SecurityConfig,
        StoreBackend,
    },
    models::{AuditEntry, AuditQuery},
    services::{
        ensure_admin, AuditSink, JwtService, MemoryAuditSink, MemoryStore, ResourceStore,
    },
    AppState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN_PROJECT: &str = "master";
pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const JWT_SECRET: &str = "integration-test-secret-that-is-long-enough";

pub fn test_config() -> IdentityConfig {
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
            secret: JWT_SECRET.to_string(),
            issuer: "identity-test".to_string(),
            private_key_path: None,
            public_key_path: None,
        },
        admin: AdminConfig {
            project: ADMIN_PROJECT.to_string(),
            user: ADMIN_USER.to_string(),
            password: ADMIN_PASSWORD.to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

/// Audit sink whose writes always fail.
#[derive(Default)]
pub struct FailingSink;

#[async_trait]
impl AuditSink for FailingSink {
    async fn record(&self, _entry: &AuditEntry) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("audit backend unavailable"))
    }

    async fn query(&self, _tenant: &str, _query: &AuditQuery) -> anyhow::Result<Vec<AuditEntry>> {
        Err(anyhow::anyhow!("audit backend unavailable"))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<dyn ResourceStore>,
    pub audit: Arc<MemoryAuditSink>,
}

impl TestApp {
    pub async fn new() -> Self {
        let audit = Arc::new(MemoryAuditSink::new());
        Self::build(audit.clone(), audit).await
    }

    /// Same app, but every audit write fails.
    pub async fn with_failing_audit() -> Self {
        Self::build(Arc::new(FailingSink), Arc::new(MemoryAuditSink::new())).await
    }

    async fn build(sink: Arc<dyn AuditSink>, audit: Arc<MemoryAuditSink>) -> Self {
        let config = test_config();
        let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
        ensure_admin(store.clone(), &config.admin)
            .await
            .expect("bootstrap admin project");

        let jwt = JwtService::new(&config.jwt).expect("jwt service");
        let state = AppState::new(config, store.clone(), sink, jwt);

        Self {
            router: build_router(state.clone()),
            state,
            store,
            audit,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.dispatch(request).await
    }

    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Value) {
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn login(&self, project: &str, name: &str, password: &str) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                &format!("/api/v1/project/{}/token", project),
                None,
                Some(json!({ "name": name, "secret": password, "auth_type": "password" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_PROJECT, ADMIN_USER, ADMIN_PASSWORD).await["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    pub async fn create_project(&self, token: &str, name: &str) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/project",
                Some(token),
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create project failed: {body}");
    }

    /// Creates a user in `project` holding `roles` and returns its access token.
    pub async fn user_token(
        &self,
        admin: &str,
        project: &str,
        name: &str,
        roles: &[&str],
    ) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                &format!("/api/v1/project/{}/user", project),
                Some(admin),
                Some(json!({ "name": name, "password": "user-password", "roles": roles })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create user failed: {body}");

        self.login(project, name, "user-password").await["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    pub fn audit_entries(&self, project: &str) -> Vec<AuditEntry> {
        self.audit
            .entries()
            .into_iter()
            .filter(|entry| entry.tenant == project)
            .collect()
    }
}
