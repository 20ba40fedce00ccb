use chrono::Utc;
use std::sync::Arc;

use super::error::ServiceError;
use super::lifecycle::ListFilter;
use super::store::{decode, encode, Collection, ResourceStore, StoreError};
use crate::models::{Project, ProjectDelta, ProjectSpec, ResourceKind, Role};

/// Projects are the tenants themselves, so they live outside the
/// per-tenant collections.
#[derive(Clone)]
pub struct ProjectManager {
    store: Arc<dyn ResourceStore>,
    admin_project: String,
}

impl ProjectManager {
    pub fn new(store: Arc<dyn ResourceStore>, admin_project: impl Into<String>) -> Self {
        Self {
            store,
            admin_project: admin_project.into(),
        }
    }

    pub fn admin_project(&self) -> &str {
        &self.admin_project
    }

    /// Creates the project and seeds its default system roles.
    pub async fn create(&self, spec: ProjectSpec) -> Result<Project, ServiceError> {
        let now = Utc::now();
        let project = Project::build(spec, now)?;
        let name = project.name.as_str();

        let record = encode(&project).map_err(|e| store_error(name, e))?;
        self.store
            .create_tenant(name, record)
            .await
            .map_err(|e| store_error(name, e))?;

        for role in Role::project_defaults(now) {
            let record = encode(&role).map_err(|e| store_error(name, e))?;
            match self
                .store
                .insert(name, Collection::Roles, &role.name, record)
                .await
            {
                Ok(()) | Err(StoreError::AlreadyExists(_)) => {}
                Err(e) => return Err(ServiceError::from_store(ResourceKind::Role, &role.name, e)),
            }
        }

        tracing::info!(project = %name, "Project created");
        Ok(project)
    }

    pub async fn get(&self, name: &str) -> Result<Project, ServiceError> {
        let record = self
            .store
            .get_tenant(name)
            .await
            .map_err(|e| store_error(name, e))?;
        decode(record).map_err(|e| store_error(name, e))
    }

    pub async fn list(&self, filter: &ListFilter) -> Result<Vec<Project>, ServiceError> {
        let records = self
            .store
            .list_tenants()
            .await
            .map_err(|e| store_error("*", e))?;

        let mut projects = Vec::with_capacity(records.len());
        for record in records {
            let project: Project = decode(record).map_err(|e| store_error("*", e))?;
            if filter.matches(&project.name) {
                projects.push(project);
            }
        }
        Ok(projects)
    }

    pub async fn update(&self, name: &str, delta: ProjectDelta) -> Result<Project, ServiceError> {
        let mut project = self.get(name).await?;
        project.apply(delta)?;

        let record = encode(&project).map_err(|e| store_error(name, e))?;
        self.store
            .update_tenant(name, record)
            .await
            .map_err(|e| store_error(name, e))?;

        tracing::info!(project = %name, "Project updated");
        Ok(project)
    }

    /// Removes the project together with everything it contains.
    pub async fn delete(&self, name: &str) -> Result<(), ServiceError> {
        if name == self.admin_project {
            return Err(ServiceError::Blocked(format!(
                "project '{}' cannot be deleted",
                name
            )));
        }

        self.store
            .delete_tenant(name)
            .await
            .map_err(|e| store_error(name, e))?;

        tracing::info!(project = %name, "Project deleted");
        Ok(())
    }
}

fn store_error(name: &str, err: StoreError) -> ServiceError {
    ServiceError::from_store_collapsed(ResourceKind::Project, name, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenPolicy;
    use crate::services::store::MemoryStore;

    fn manager() -> ProjectManager {
        ProjectManager::new(Arc::new(MemoryStore::new()), "master")
    }

    fn spec(name: &str) -> ProjectSpec {
        ProjectSpec {
            name: name.to_string(),
            token_policy: None,
        }
    }

    #[tokio::test]
    async fn test_create_seeds_default_roles() {
        let projects = manager();
        let project = projects.create(spec("acme")).await.unwrap();
        assert_eq!(project.token_policy, TokenPolicy::default());

        let roles = projects
            .store
            .list("acme", Collection::Roles)
            .await
            .unwrap();
        assert_eq!(roles.len(), 8);

        let err = projects.create(spec("acme")).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_admin_project_cannot_be_deleted() {
        let projects = manager();
        projects.create(spec("master")).await.unwrap();

        let err = projects.delete("master").await.unwrap_err();
        assert!(matches!(err, ServiceError::Blocked(_)));
        assert!(projects.get("master").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_then_get() {
        let projects = manager();
        projects.create(spec("acme")).await.unwrap();
        projects.delete("acme").await.unwrap();

        assert!(matches!(
            projects.get("acme").await,
            Err(ServiceError::NotFound { .. })
        ));
        assert!(matches!(
            projects.delete("acme").await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_short_refresh() {
        let projects = manager();
        projects.create(spec("acme")).await.unwrap();

        let delta = ProjectDelta {
            token_policy: Some(TokenPolicy {
                access_token_lifespan: 600,
                refresh_token_lifespan: 60,
                ..Default::default()
            }),
        };
        let err = projects.update("acme", delta).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed { .. }));
        assert_eq!(
            projects.get("acme").await.unwrap().token_policy,
            TokenPolicy::default()
        );
    }
}
