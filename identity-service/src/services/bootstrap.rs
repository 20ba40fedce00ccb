//! First-start provisioning of the administrative project.

use chrono::Utc;
use std::sync::Arc;

use super::error::ServiceError;
use super::lifecycle::ManagedResource;
use super::project::ProjectManager;
use super::store::{encode, Collection, Record, ResourceStore, StoreError};
use crate::config::AdminConfig;
use crate::models::{Action, GrantTarget, ProjectSpec, ResourceKind, Role, User, UserSpec};

pub const CLUSTER_ADMIN_ROLE: &str = "cluster-admin";

/// Ensures the admin project, the `cluster-admin` system role and the admin
/// user exist. Existing records are left untouched, so running this on every
/// start is safe.
pub async fn ensure_admin(
    store: Arc<dyn ResourceStore>,
    admin: &AdminConfig,
) -> Result<(), ServiceError> {
    let projects = ProjectManager::new(store.clone(), admin.project.clone());
    match projects
        .create(ProjectSpec {
            name: admin.project.clone(),
            token_policy: None,
        })
        .await
    {
        Ok(_) => tracing::info!(project = %admin.project, "Created administrative project"),
        Err(ServiceError::AlreadyExists { .. }) => {
            tracing::debug!(project = %admin.project, "Administrative project already present")
        }
        Err(e) => return Err(e),
    }

    let now = Utc::now();
    let role = Role::system(
        CLUSTER_ADMIN_ROLE,
        vec![GrantTarget::All],
        vec![Action::Read, Action::Write],
        now,
    );
    insert_once(
        &store,
        &admin.project,
        Collection::Roles,
        ResourceKind::Role,
        &role.name,
        encode(&role),
    )
    .await?;

    let user = User::build(
        UserSpec {
            name: admin.user.clone(),
            password: admin.password.clone(),
            roles: vec![CLUSTER_ADMIN_ROLE.to_string()],
        },
        now,
    )?;
    insert_once(
        &store,
        &admin.project,
        Collection::Users,
        ResourceKind::User,
        &user.name,
        encode(&user),
    )
    .await?;

    Ok(())
}

async fn insert_once(
    store: &Arc<dyn ResourceStore>,
    tenant: &str,
    collection: Collection,
    kind: ResourceKind,
    id: &str,
    record: Result<Record, StoreError>,
) -> Result<(), ServiceError> {
    let record = record.map_err(|e| ServiceError::from_store(kind, id, e))?;
    match store.insert(tenant, collection, id, record).await {
        Ok(()) => {
            tracing::info!(project = %tenant, kind = %kind, id = %id, "Bootstrapped");
            Ok(())
        }
        Err(StoreError::AlreadyExists(_)) => Ok(()),
        Err(e) => Err(ServiceError::from_store(kind, id, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::MemoryStore;

    fn admin() -> AdminConfig {
        AdminConfig {
            project: "master".to_string(),
            user: "admin".to_string(),
            password: "admin-password".to_string(),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());

        ensure_admin(store.clone(), &admin()).await.unwrap();
        let first = store.get("master", Collection::Users, "admin").await.unwrap();

        ensure_admin(store.clone(), &admin()).await.unwrap();
        let second = store.get("master", Collection::Users, "admin").await.unwrap();

        // the stored password hash is not regenerated
        assert_eq!(first, second);
        assert!(store
            .get("master", Collection::Roles, CLUSTER_ADMIN_ROLE)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_short_admin_password_rejected() {
        let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
        let mut config = admin();
        config.password = "short".to_string();

        let err = ensure_admin(store, &config).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed { .. }));
    }
}
