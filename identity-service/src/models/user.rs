use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::services::store::Collection;
use crate::services::lifecycle::Dependents;
use crate::services::{ManagedResource, ServiceError};
use crate::utils::{hash_password, Password};

use super::ResourceKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UserSpec {
    #[validate(length(min = 3, max = 63, message = "must be 3 to 63 characters"))]
    pub name: String,
    #[validate(length(min = 8, max = 128, message = "must be 8 to 128 characters"))]
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UserDelta {
    #[validate(length(min = 8, max = 128, message = "must be 8 to 128 characters"))]
    pub password: Option<String>,
    pub roles: Option<Vec<String>>,
}

fn hash(password: String) -> Result<String, ServiceError> {
    Ok(hash_password(&Password::new(password))?.into_string())
}

fn unique(roles: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(roles.len());
    for role in roles {
        if !out.contains(&role) {
            out.push(role);
        }
    }
    out
}

impl ManagedResource for User {
    const KIND: ResourceKind = ResourceKind::User;
    const COLLECTION: Collection = Collection::Users;
    type Spec = UserSpec;
    type Delta = UserDelta;

    fn id(&self) -> &str {
        &self.name
    }

    fn build(spec: UserSpec, now: DateTime<Utc>) -> Result<Self, ServiceError> {
        spec.validate()?;

        Ok(Self {
            name: spec.name,
            password_hash: hash(spec.password)?,
            roles: unique(spec.roles),
            created_at: now,
        })
    }

    fn apply(&mut self, delta: UserDelta) -> Result<(), ServiceError> {
        delta.validate()?;

        if let Some(password) = delta.password {
            self.password_hash = hash(password)?;
        }
        if let Some(roles) = delta.roles {
            self.roles = unique(roles);
        }
        Ok(())
    }

    fn role_refs(&self) -> &[String] {
        &self.roles
    }

    fn delta_role_refs(delta: &UserDelta) -> Option<&[String]> {
        delta.roles.as_deref()
    }

    fn dependents(&self) -> Option<Dependents<'_>> {
        Some(Dependents::Sessions { subject: &self.name })
    }
}

/// Wire representation; the password hash never leaves the service.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub name: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            roles: user.roles,
            created_at: user.created_at,
        }
    }
}
