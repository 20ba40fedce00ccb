use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::services::store::Collection;
use crate::services::lifecycle::Dependents;
use crate::services::{ManagedResource, ServiceError};

use super::{Action, GrantTarget, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    /// Seeded with the project; immutable through the API.
    System,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub name: String,
    pub role_type: RoleType,
    #[schema(value_type = Vec<String>, example = json!(["client", "*"]))]
    pub target_resources: Vec<GrantTarget>,
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RoleSpec {
    #[validate(length(min = 3, max = 63, message = "must be 3 to 63 characters"))]
    pub name: String,
    #[schema(value_type = Vec<String>)]
    #[validate(length(min = 1, message = "must name at least one resource kind"))]
    pub target_resources: Vec<GrantTarget>,
    #[validate(length(min = 1, message = "must contain read, write or both"))]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct RoleDelta {
    #[schema(value_type = Option<Vec<String>>)]
    #[validate(length(min = 1, message = "must name at least one resource kind"))]
    pub target_resources: Option<Vec<GrantTarget>>,
    #[validate(length(min = 1, message = "must contain read, write or both"))]
    pub actions: Option<Vec<Action>>,
}

fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

impl Role {
    pub fn system(
        name: impl Into<String>,
        target_resources: Vec<GrantTarget>,
        actions: Vec<Action>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            role_type: RoleType::System,
            target_resources,
            actions,
            created_at: now,
        }
    }

    /// One `<action>-<kind>` system role per resource kind and action.
    pub fn project_defaults(now: DateTime<Utc>) -> Vec<Role> {
        ResourceKind::ALL
            .iter()
            .flat_map(|kind| {
                [Action::Read, Action::Write].into_iter().map(move |action| {
                    Role::system(
                        format!("{}-{}", action, kind),
                        vec![GrantTarget::Kind(*kind)],
                        vec![action],
                        now,
                    )
                })
            })
            .collect()
    }
}

impl ManagedResource for Role {
    const KIND: ResourceKind = ResourceKind::Role;
    const COLLECTION: Collection = Collection::Roles;
    type Spec = RoleSpec;
    type Delta = RoleDelta;

    fn id(&self) -> &str {
        &self.name
    }

    fn build(spec: RoleSpec, now: DateTime<Utc>) -> Result<Self, ServiceError> {
        spec.validate()?;

        Ok(Self {
            name: spec.name,
            role_type: RoleType::Custom,
            target_resources: dedup(spec.target_resources),
            actions: dedup(spec.actions),
            created_at: now,
        })
    }

    fn apply(&mut self, delta: RoleDelta) -> Result<(), ServiceError> {
        delta.validate()?;

        if let Some(targets) = delta.target_resources {
            self.target_resources = dedup(targets);
        }
        if let Some(actions) = delta.actions {
            self.actions = dedup(actions);
        }
        Ok(())
    }

    fn dependents(&self) -> Option<Dependents<'_>> {
        Some(Dependents::RoleHolders { role: &self.name })
    }

    fn guard_mutation(&self) -> Result<(), ServiceError> {
        match self.role_type {
            RoleType::System => Err(ServiceError::Blocked(format!(
                "system role '{}' cannot be modified",
                self.name
            ))),
            RoleType::Custom => Ok(()),
        }
    }
}
