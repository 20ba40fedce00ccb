use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::services::ServiceError;
use crate::utils::RESOURCE_NAME;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SigningAlgorithm {
    #[default]
    HS256,
    RS256,
}

/// Lifespans are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenPolicy {
    pub access_token_lifespan: u64,
    pub refresh_token_lifespan: u64,
    #[serde(default)]
    pub signing_algorithm: SigningAlgorithm,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            access_token_lifespan: 300,
            refresh_token_lifespan: 86_400,
            signing_algorithm: SigningAlgorithm::HS256,
        }
    }
}

impl TokenPolicy {
    /// Ten years.
    pub const MAX_LIFESPAN: u64 = 315_360_000;

    /// Refresh tokens never expire before the access token they ship with.
    pub fn check(&self) -> Result<(), ServiceError> {
        if self.refresh_token_lifespan > Self::MAX_LIFESPAN {
            return Err(ServiceError::validation(
                "token_policy.refresh_token_lifespan",
                "must not exceed ten years",
            ));
        }
        if self.access_token_lifespan == 0 {
            return Err(ServiceError::validation(
                "token_policy.access_token_lifespan",
                "must be at least 1 second",
            ));
        }
        if self.refresh_token_lifespan < self.access_token_lifespan {
            return Err(ServiceError::validation(
                "token_policy.refresh_token_lifespan",
                "must not be shorter than the access token lifespan",
            ));
        }
        Ok(())
    }
}

/// A tenant. Every client, user and role belongs to exactly one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub token_policy: TokenPolicy,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ProjectSpec {
    #[validate(regex(
        path = *RESOURCE_NAME,
        message = "must start with a lowercase letter and contain 4 to 64 of [a-z0-9._-]"
    ))]
    pub name: String,
    #[serde(default)]
    pub token_policy: Option<TokenPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ProjectDelta {
    pub token_policy: Option<TokenPolicy>,
}

impl Project {
    pub fn build(spec: ProjectSpec, now: DateTime<Utc>) -> Result<Self, ServiceError> {
        spec.validate()?;
        let token_policy = spec.token_policy.unwrap_or_default();
        token_policy.check()?;

        Ok(Self {
            name: spec.name,
            created_at: now,
            token_policy,
        })
    }

    pub fn apply(&mut self, delta: ProjectDelta) -> Result<(), ServiceError> {
        if let Some(policy) = delta.token_policy {
            policy.check()?;
            self.token_policy = policy;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> ProjectSpec {
        ProjectSpec {
            name: name.to_string(),
            token_policy: None,
        }
    }

    #[test]
    fn test_build_applies_default_policy() {
        let project = Project::build(spec("acme"), Utc::now()).unwrap();
        assert_eq!(project.token_policy, TokenPolicy::default());
    }

    #[test]
    fn test_build_rejects_bad_name() {
        let err = Project::build(spec("Bad Name"), Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed { ref field, .. } if field == "name"));
    }

    #[test]
    fn test_refresh_lifespan_must_cover_access() {
        let mut project = Project::build(spec("acme"), Utc::now()).unwrap();
        let err = project
            .apply(ProjectDelta {
                token_policy: Some(TokenPolicy {
                    access_token_lifespan: 600,
                    refresh_token_lifespan: 60,
                    signing_algorithm: SigningAlgorithm::HS256,
                }),
            })
            .unwrap_err();

        assert!(matches!(err, ServiceError::ValidationFailed { .. }));
        assert_eq!(project.token_policy, TokenPolicy::default());
    }

    #[test]
    fn test_empty_delta_keeps_policy() {
        let mut project = Project::build(spec("acme"), Utc::now()).unwrap();
        let before = project.clone();
        project.apply(ProjectDelta::default()).unwrap();
        assert_eq!(project, before);
    }
}
