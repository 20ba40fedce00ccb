//! Keyed record storage for projects and their child resources.
//!
//! Records are JSON documents. Projects are the tenant roots; every other
//! collection lives under exactly one project and disappears with it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type Record = serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Clients,
    Users,
    Roles,
    Sessions,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Clients => "clients",
            Collection::Users => "users",
            Collection::Roles => "roles",
            Collection::Sessions => "sessions",
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("tenant '{0}' does not exist")]
    NoSuchTenant(String),

    #[error("record '{0}' not found")]
    NotFound(String),

    #[error("record '{0}' already exists")]
    AlreadyExists(String),

    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Uniqueness on insert and read-modify-write atomicity per key are the
/// implementation's responsibility.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn create_tenant(&self, name: &str, record: Record) -> Result<(), StoreError>;

    /// Missing tenants are reported as `NotFound`.
    async fn get_tenant(&self, name: &str) -> Result<Record, StoreError>;

    /// Ordered by tenant name.
    async fn list_tenants(&self) -> Result<Vec<Record>, StoreError>;

    async fn update_tenant(&self, name: &str, record: Record) -> Result<(), StoreError>;

    /// Removes the tenant and every record it owns.
    async fn delete_tenant(&self, name: &str) -> Result<(), StoreError>;

    async fn insert(
        &self,
        tenant: &str,
        collection: Collection,
        id: &str,
        record: Record,
    ) -> Result<(), StoreError>;

    async fn get(&self, tenant: &str, collection: Collection, id: &str)
        -> Result<Record, StoreError>;

    /// Ordered by id.
    async fn list(&self, tenant: &str, collection: Collection) -> Result<Vec<Record>, StoreError>;

    async fn replace(
        &self,
        tenant: &str,
        collection: Collection,
        id: &str,
        record: Record,
    ) -> Result<(), StoreError>;

    async fn remove(&self, tenant: &str, collection: Collection, id: &str)
        -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

pub fn encode<T: Serialize>(value: &T) -> Result<Record, StoreError> {
    Ok(serde_json::to_value(value)?)
}

pub fn decode<T: DeserializeOwned>(record: Record) -> Result<T, StoreError> {
    Ok(serde_json::from_value(record)?)
}
