use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{btree_map, BTreeMap, HashMap};
use std::sync::Arc;

use super::{Collection, Record, ResourceStore, StoreError};

struct TenantBucket {
    record: Record,
    collections: HashMap<Collection, BTreeMap<String, Record>>,
}

/// Process-local store. Each tenant's bucket sits behind one shard lock, so
/// every operation on a tenant is atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tenants: Arc<DashMap<String, TenantBucket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn create_tenant(&self, name: &str, record: Record) -> Result<(), StoreError> {
        match self.tenants.entry(name.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(TenantBucket {
                    record,
                    collections: HashMap::new(),
                });
                Ok(())
            }
        }
    }

    async fn get_tenant(&self, name: &str) -> Result<Record, StoreError> {
        self.tenants
            .get(name)
            .map(|bucket| bucket.record.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn list_tenants(&self) -> Result<Vec<Record>, StoreError> {
        let mut tenants: Vec<(String, Record)> = self
            .tenants
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().record.clone()))
            .collect();
        tenants.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(tenants.into_iter().map(|(_, record)| record).collect())
    }

    async fn update_tenant(&self, name: &str, record: Record) -> Result<(), StoreError> {
        let mut bucket = self
            .tenants
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        bucket.record = record;
        Ok(())
    }

    async fn delete_tenant(&self, name: &str) -> Result<(), StoreError> {
        self.tenants
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn insert(
        &self,
        tenant: &str,
        collection: Collection,
        id: &str,
        record: Record,
    ) -> Result<(), StoreError> {
        let mut bucket = self
            .tenants
            .get_mut(tenant)
            .ok_or_else(|| StoreError::NoSuchTenant(tenant.to_string()))?;

        match bucket
            .collections
            .entry(collection)
            .or_default()
            .entry(id.to_string())
        {
            btree_map::Entry::Occupied(_) => Err(StoreError::AlreadyExists(id.to_string())),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn get(
        &self,
        tenant: &str,
        collection: Collection,
        id: &str,
    ) -> Result<Record, StoreError> {
        let bucket = self
            .tenants
            .get(tenant)
            .ok_or_else(|| StoreError::NoSuchTenant(tenant.to_string()))?;

        bucket
            .collections
            .get(&collection)
            .and_then(|records| records.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list(&self, tenant: &str, collection: Collection) -> Result<Vec<Record>, StoreError> {
        let bucket = self
            .tenants
            .get(tenant)
            .ok_or_else(|| StoreError::NoSuchTenant(tenant.to_string()))?;

        Ok(bucket
            .collections
            .get(&collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn replace(
        &self,
        tenant: &str,
        collection: Collection,
        id: &str,
        record: Record,
    ) -> Result<(), StoreError> {
        let mut bucket = self
            .tenants
            .get_mut(tenant)
            .ok_or_else(|| StoreError::NoSuchTenant(tenant.to_string()))?;

        let slot = bucket
            .collections
            .get_mut(&collection)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        *slot = record;
        Ok(())
    }

    async fn remove(
        &self,
        tenant: &str,
        collection: Collection,
        id: &str,
    ) -> Result<(), StoreError> {
        let mut bucket = self
            .tenants
            .get_mut(tenant)
            .ok_or_else(|| StoreError::NoSuchTenant(tenant.to_string()))?;

        bucket
            .collections
            .get_mut(&collection)
            .and_then(|records| records.remove(id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
