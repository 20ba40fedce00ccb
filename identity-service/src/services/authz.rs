//! Authorization decisions for tenant-scoped requests.

use thiserror::Error;

use super::jwt::{AccessClaims, JwtService, TokenError};
use crate::models::{Action, ResourceKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("missing {action} permission on {kind}")]
    Forbidden { kind: ResourceKind, action: Action },
}

/// Pure function of (credential, tenant, kind, action). Holds no mutable
/// state and performs no I/O.
#[derive(Clone)]
pub struct AuthorizationGate {
    jwt: JwtService,
}

impl AuthorizationGate {
    pub fn new(jwt: JwtService) -> Self {
        Self { jwt }
    }

    /// `tenant` is `None` for operations on the project collection itself
    /// (list, create, delete), which require a global grant.
    pub fn authorize(
        &self,
        credential: Option<&str>,
        tenant: Option<&str>,
        kind: ResourceKind,
        action: Action,
    ) -> Result<AccessClaims, AuthzError> {
        let token = credential
            .ok_or_else(|| AuthzError::Unauthenticated("missing bearer credential".to_string()))?;

        let claims = self.jwt.verify_access(token).map_err(|e| match e {
            TokenError::Expired => AuthzError::Unauthenticated("credential expired".to_string()),
            _ => AuthzError::Unauthenticated("invalid credential".to_string()),
        })?;

        if claims
            .grants
            .iter()
            .any(|grant| grant.satisfies(tenant, kind, action))
        {
            Ok(claims)
        } else {
            Err(AuthzError::Forbidden { kind, action })
        }
    }
}
