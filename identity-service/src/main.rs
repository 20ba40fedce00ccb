use identity_service::{
    build_router,
    config::{IdentityConfig, StoreBackend},
    services::{
        ensure_admin, AuditSink, JwtService, MemoryAuditSink, MemoryStore, PgStore, ResourceStore,
    },
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = IdentityConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        store = ?config.store_backend,
        "Starting identity service"
    );

    let jwt = JwtService::new(&config.jwt).map_err(AppError::ConfigError)?;
    tracing::info!("JWT service initialized");

    let (store, audit_sink): (Arc<dyn ResourceStore>, Arc<dyn AuditSink>) =
        match config.store_backend {
            StoreBackend::Memory => {
                let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
                let sink: Arc<dyn AuditSink> = Arc::new(MemoryAuditSink::new());
                (store, sink)
            }
            StoreBackend::Postgres => {
                let pg = PgStore::connect(&config.database)
                    .await
                    .map_err(|e| AppError::Unexpected(e.into()))?;
                pg.migrate()
                    .await
                    .map_err(|e| AppError::Unexpected(e.into()))?;

                let pg = Arc::new(pg);
                let store: Arc<dyn ResourceStore> = pg.clone();
                let sink: Arc<dyn AuditSink> = pg;
                (store, sink)
            }
        };

    ensure_admin(store.clone(), &config.admin)
        .await
        .map_err(AppError::from)?;
    tracing::info!(project = %config.admin.project, "Administrative project ready");

    let state = AppState::new(config.clone(), store, audit_sink, jwt);
    let app = build_router(state);

    let addr = config.common.socket_addr();

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
