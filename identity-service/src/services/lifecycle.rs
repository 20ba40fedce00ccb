//! Validated CRUD over tenant-scoped resources.
//!
//! Callers authorize first; nothing in here checks grants.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

use super::error::ServiceError;
use super::store::{decode, encode, Collection, ResourceStore, StoreError};
use super::token::drop_sessions;
use crate::models::{ResourceKind, User};

/// Records in other collections that must not outlive a deleted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependents<'a> {
    /// Refresh sessions issued to this user.
    Sessions { subject: &'a str },
    /// Users holding this role.
    RoleHolders { role: &'a str },
}

/// A resource stored in one collection under a tenant.
pub trait ManagedResource: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: ResourceKind;
    const COLLECTION: Collection;
    type Spec: Send + 'static;
    type Delta: Send + 'static;

    fn id(&self) -> &str;

    /// Validates the spec and stamps the creation time.
    fn build(spec: Self::Spec, now: DateTime<Utc>) -> Result<Self, ServiceError>;

    /// Applies every field present in the delta. Fields are replaced whole.
    fn apply(&mut self, delta: Self::Delta) -> Result<(), ServiceError>;

    /// Role names that must exist in the same tenant.
    fn role_refs(&self) -> &[String] {
        &[]
    }

    /// Role names a delta assigns, or `None` when it leaves roles alone.
    fn delta_role_refs(_delta: &Self::Delta) -> Option<&[String]> {
        None
    }

    fn dependents(&self) -> Option<Dependents<'_>> {
        None
    }

    fn guard_mutation(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFilter {
    /// Only ids starting with this prefix.
    pub prefix: Option<String>,
}

impl ListFilter {
    pub fn matches(&self, id: &str) -> bool {
        self.prefix
            .as_deref()
            .map(|prefix| id.starts_with(prefix))
            .unwrap_or(true)
    }
}

pub struct ResourceLifecycleManager<R> {
    store: Arc<dyn ResourceStore>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for ResourceLifecycleManager<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: ManagedResource> ResourceLifecycleManager<R> {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            _resource: PhantomData,
        }
    }

    /// Fails `NoSuchTenant` before any validation when the tenant is absent.
    pub async fn create(&self, tenant: &str, spec: R::Spec) -> Result<R, ServiceError> {
        self.ensure_tenant(tenant).await?;

        let resource = R::build(spec, Utc::now())?;
        self.check_role_refs(tenant, resource.role_refs()).await?;

        let id = resource.id();
        let record = encode(&resource).map_err(|e| ServiceError::from_store(R::KIND, id, e))?;
        self.store
            .insert(tenant, R::COLLECTION, id, record)
            .await
            .map_err(|e| ServiceError::from_store(R::KIND, id, e))?;

        tracing::info!(tenant = %tenant, kind = %R::KIND, id = %id, "Resource created");
        Ok(resource)
    }

    /// A missing tenant and a missing resource produce the same error.
    pub async fn get(&self, tenant: &str, id: &str) -> Result<R, ServiceError> {
        let record = self
            .store
            .get(tenant, R::COLLECTION, id)
            .await
            .map_err(|e| ServiceError::from_store_collapsed(R::KIND, id, e))?;

        decode(record).map_err(|e| ServiceError::from_store(R::KIND, id, e))
    }

    pub async fn list(&self, tenant: &str, filter: &ListFilter) -> Result<Vec<R>, ServiceError> {
        let records = self
            .store
            .list(tenant, R::COLLECTION)
            .await
            .map_err(|e| ServiceError::from_store(R::KIND, tenant, e))?;

        let mut resources = Vec::with_capacity(records.len());
        for record in records {
            let resource: R =
                decode(record).map_err(|e| ServiceError::from_store(R::KIND, tenant, e))?;
            if filter.matches(resource.id()) {
                resources.push(resource);
            }
        }
        Ok(resources)
    }

    pub async fn update(&self, tenant: &str, id: &str, delta: R::Delta) -> Result<R, ServiceError> {
        let mut resource = self.get(tenant, id).await?;
        resource.guard_mutation()?;

        let assigned = R::delta_role_refs(&delta).map(<[String]>::to_vec);
        resource.apply(delta)?;
        if let Some(roles) = assigned {
            self.check_role_refs(tenant, &roles).await?;
        }

        self.write_back(tenant, &resource).await?;
        tracing::info!(tenant = %tenant, kind = %R::KIND, id = %id, "Resource updated");
        Ok(resource)
    }

    /// A second delete of the same id fails with `NotFound`. Dependents are
    /// released first so a failure leaves the resource in place.
    pub async fn delete(&self, tenant: &str, id: &str) -> Result<(), ServiceError> {
        let resource = self.get(tenant, id).await?;
        resource.guard_mutation()?;
        if let Some(dependents) = resource.dependents() {
            self.release(tenant, dependents).await?;
        }

        self.store
            .remove(tenant, R::COLLECTION, id)
            .await
            .map_err(|e| ServiceError::from_store_collapsed(R::KIND, id, e))?;

        tracing::info!(tenant = %tenant, kind = %R::KIND, id = %id, "Resource deleted");
        Ok(())
    }

    async fn write_back(&self, tenant: &str, resource: &R) -> Result<(), ServiceError> {
        let id = resource.id();
        let record = encode(resource).map_err(|e| ServiceError::from_store(R::KIND, id, e))?;
        self.store
            .replace(tenant, R::COLLECTION, id, record)
            .await
            .map_err(|e| ServiceError::from_store_collapsed(R::KIND, id, e))
    }

    async fn release(&self, tenant: &str, dependents: Dependents<'_>) -> Result<(), ServiceError> {
        match dependents {
            Dependents::Sessions { subject } => {
                let ended = drop_sessions(self.store.as_ref(), tenant, |s| s.subject == subject)
                    .await
                    .map_err(|e| ServiceError::from_store(ResourceKind::User, subject, e))?;
                tracing::debug!(tenant = %tenant, user = %subject, ended, "Refresh sessions ended");
            }
            Dependents::RoleHolders { role } => {
                let records = self
                    .store
                    .list(tenant, Collection::Users)
                    .await
                    .map_err(|e| ServiceError::from_store(ResourceKind::Role, role, e))?;

                for record in records {
                    let mut user: User = decode(record)
                        .map_err(|e| ServiceError::from_store(ResourceKind::User, tenant, e))?;
                    if !user.roles.iter().any(|r| r == role) {
                        continue;
                    }
                    user.roles.retain(|r| r != role);

                    let record = encode(&user)
                        .map_err(|e| ServiceError::from_store(ResourceKind::User, &user.name, e))?;
                    self.store
                        .replace(tenant, Collection::Users, &user.name, record)
                        .await
                        .map_err(|e| ServiceError::from_store(ResourceKind::User, &user.name, e))?;
                    tracing::info!(tenant = %tenant, user = %user.name, role = %role, "Deleted role removed from user");
                }
            }
        }
        Ok(())
    }

    async fn ensure_tenant(&self, tenant: &str) -> Result<(), ServiceError> {
        match self.store.get_tenant(tenant).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(ServiceError::NoSuchTenant(tenant.to_string())),
            Err(e) => Err(ServiceError::from_store(ResourceKind::Project, tenant, e)),
        }
    }

    async fn check_role_refs(&self, tenant: &str, roles: &[String]) -> Result<(), ServiceError> {
        for role in roles {
            match self.store.get(tenant, Collection::Roles, role).await {
                Ok(_) => {}
                Err(StoreError::NotFound(_)) => {
                    return Err(ServiceError::validation(
                        "roles",
                        format!("role '{}' does not exist", role),
                    ))
                }
                Err(e) => return Err(ServiceError::from_store(ResourceKind::Role, role, e)),
            }
        }
        Ok(())
    }
}

impl ResourceLifecycleManager<User> {
    pub async fn add_role(&self, tenant: &str, name: &str, role: &str) -> Result<User, ServiceError> {
        let mut user = self.get(tenant, name).await?;
        self.store
            .get(tenant, Collection::Roles, role)
            .await
            .map_err(|e| ServiceError::from_store_collapsed(ResourceKind::Role, role, e))?;

        if user.roles.iter().any(|r| r == role) {
            return Err(ServiceError::AlreadyExists {
                kind: ResourceKind::Role,
                id: role.to_string(),
            });
        }
        user.roles.push(role.to_string());

        self.write_back(tenant, &user).await?;
        tracing::info!(tenant = %tenant, user = %name, role = %role, "Role added to user");
        Ok(user)
    }

    pub async fn remove_role(
        &self,
        tenant: &str,
        name: &str,
        role: &str,
    ) -> Result<User, ServiceError> {
        let mut user = self.get(tenant, name).await?;

        let before = user.roles.len();
        user.roles.retain(|r| r != role);
        if user.roles.len() == before {
            return Err(ServiceError::NotFound {
                kind: ResourceKind::Role,
                id: role.to_string(),
            });
        }

        self.write_back(tenant, &user).await?;
        tracing::info!(tenant = %tenant, user = %name, role = %role, "Role removed from user");
        Ok(user)
    }
}
