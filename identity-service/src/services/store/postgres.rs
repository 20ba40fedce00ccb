//! PostgreSQL-backed store and audit sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use super::{Collection, Record, ResourceStore, StoreError};
use crate::config::DatabaseConfig;
use crate::models::{AuditEntry, AuditQuery};
use crate::services::audit::AuditSink;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    project: String,
    recorded_at: DateTime<Utc>,
    resource_kind: String,
    verb: String,
    target: String,
    message: String,
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(anyhow::Error::new(err))
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool using the configured limits.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        tracing::info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(&config.url)
            .await?;

        tracing::info!("Successfully connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn tenant_exists(&self, tenant: &str) -> Result<bool, StoreError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM projects WHERE name = $1)")
                .bind(tenant)
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
        Ok(exists)
    }

    /// Explains an empty result: the tenant or only the record is missing.
    async fn missing(&self, tenant: &str, id: &str) -> StoreError {
        match self.tenant_exists(tenant).await {
            Ok(true) => StoreError::NotFound(id.to_string()),
            Ok(false) => StoreError::NoSuchTenant(tenant.to_string()),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn create_tenant(&self, name: &str, record: Record) -> Result<(), StoreError> {
        let result = sqlx::query("INSERT INTO projects (name, body) VALUES ($1, $2)")
            .bind(name)
            .bind(record)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::AlreadyExists(name.to_string()))
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn get_tenant(&self, name: &str) -> Result<Record, StoreError> {
        let row: Option<(Record,)> = sqlx::query_as("SELECT body FROM projects WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(|(body,)| body)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn list_tenants(&self) -> Result<Vec<Record>, StoreError> {
        let rows: Vec<(Record,)> = sqlx::query_as("SELECT body FROM projects ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(|(body,)| body).collect())
    }

    async fn update_tenant(&self, name: &str, record: Record) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE projects SET body = $2 WHERE name = $1")
            .bind(name)
            .bind(record)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn delete_tenant(&self, name: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM projects WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn insert(
        &self,
        tenant: &str,
        collection: Collection,
        id: &str,
        record: Record,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO resources (project, collection, id, body)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(tenant)
        .bind(collection.as_str())
        .bind(id)
        .bind(record)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::AlreadyExists(id.to_string()))
            }
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(StoreError::NoSuchTenant(tenant.to_string()))
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn get(
        &self,
        tenant: &str,
        collection: Collection,
        id: &str,
    ) -> Result<Record, StoreError> {
        let row: Option<(Record,)> = sqlx::query_as(
            "SELECT body FROM resources WHERE project = $1 AND collection = $2 AND id = $3",
        )
        .bind(tenant)
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some((body,)) => Ok(body),
            None => Err(self.missing(tenant, id).await),
        }
    }

    async fn list(&self, tenant: &str, collection: Collection) -> Result<Vec<Record>, StoreError> {
        if !self.tenant_exists(tenant).await? {
            return Err(StoreError::NoSuchTenant(tenant.to_string()));
        }

        let rows: Vec<(Record,)> = sqlx::query_as(
            "SELECT body FROM resources WHERE project = $1 AND collection = $2 ORDER BY id",
        )
        .bind(tenant)
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(|(body,)| body).collect())
    }

    async fn replace(
        &self,
        tenant: &str,
        collection: Collection,
        id: &str,
        record: Record,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE resources SET body = $4 WHERE project = $1 AND collection = $2 AND id = $3",
        )
        .bind(tenant)
        .bind(collection.as_str())
        .bind(id)
        .bind(record)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(self.missing(tenant, id).await);
        }
        Ok(())
    }

    async fn remove(
        &self,
        tenant: &str,
        collection: Collection,
        id: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "DELETE FROM resources WHERE project = $1 AND collection = $2 AND id = $3",
        )
        .bind(tenant)
        .bind(collection.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(self.missing(tenant, id).await);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                backend(e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for PgStore {
    async fn record(&self, entry: &AuditEntry) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_entries (project, recorded_at, resource_kind, verb, target, message)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&entry.tenant)
        .bind(entry.time)
        .bind(entry.resource_kind.as_str())
        .bind(&entry.verb)
        .bind(&entry.target)
        .bind(&entry.message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query(&self, tenant: &str, query: &AuditQuery) -> anyhow::Result<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT project, recorded_at, resource_kind, verb, target, message
            FROM audit_entries
            WHERE project = $1 AND recorded_at >= $2 AND recorded_at <= $3
            ORDER BY recorded_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant)
        .bind(query.from)
        .bind(query.to)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(AuditEntry {
                    tenant: row.project,
                    time: row.recorded_at,
                    resource_kind: row
                        .resource_kind
                        .parse()
                        .map_err(|e: String| anyhow::anyhow!(e))?,
                    verb: row.verb,
                    target: row.target,
                    message: row.message,
                })
            })
            .collect()
    }
}
