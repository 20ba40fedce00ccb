use crate::models::ResourceKind;
use service_core::error::AppError;
use thiserror::Error;

use super::authz::AuthzError;
use super::store::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("project '{0}' does not exist")]
    NoSuchTenant(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("{kind} '{id}' already exists")]
    AlreadyExists { kind: ResourceKind, id: String },

    #[error("{field}: {reason}")]
    ValidationFailed { field: String, reason: String },

    #[error("{0}")]
    Blocked(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ServiceError::ValidationFailed {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Translates a store failure for a tenant-scoped write, where a missing
    /// tenant is reported as such.
    pub fn from_store(kind: ResourceKind, id: &str, err: StoreError) -> Self {
        match err {
            StoreError::NoSuchTenant(tenant) => ServiceError::NoSuchTenant(tenant),
            StoreError::NotFound(_) => ServiceError::NotFound {
                kind,
                id: id.to_string(),
            },
            StoreError::AlreadyExists(_) => ServiceError::AlreadyExists {
                kind,
                id: id.to_string(),
            },
            StoreError::Codec(e) => ServiceError::Internal(anyhow::Error::new(e)),
            StoreError::Backend(e) => ServiceError::Internal(e),
        }
    }

    /// Like [`ServiceError::from_store`] but a missing tenant is
    /// indistinguishable from a missing resource.
    pub fn from_store_collapsed(kind: ResourceKind, id: &str, err: StoreError) -> Self {
        match err {
            StoreError::NoSuchTenant(_) | StoreError::NotFound(_) => ServiceError::NotFound {
                kind,
                id: id.to_string(),
            },
            other => ServiceError::from_store(kind, id, other),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errs.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        match fields.first() {
            Some((field, list)) => {
                let reason = list
                    .first()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .unwrap_or_else(|| "invalid value".to_string());
                ServiceError::validation(field.to_string(), reason)
            }
            None => ServiceError::validation("body", errs.to_string()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NoSuchTenant(_) => AppError::NoSuchTenant(err.to_string()),
            ServiceError::NotFound { .. } => AppError::NotFound(err.to_string()),
            ServiceError::AlreadyExists { .. } => AppError::AlreadyExists(err.to_string()),
            ServiceError::ValidationFailed { .. } => AppError::ValidationFailed(err.to_string()),
            ServiceError::Blocked(msg) => AppError::Forbidden(msg),
            ServiceError::InvalidCredentials => AppError::Unauthenticated(err.to_string()),
            ServiceError::Internal(e) => AppError::Unexpected(e),
        }
    }
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated(reason) => AppError::Unauthenticated(reason),
            AuthzError::Forbidden { .. } => AppError::Forbidden(err.to_string()),
        }
    }
}
