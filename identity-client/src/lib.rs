//! identity-client: credential handling for callers of identity-service.
//!
//! [`CredentialLifecycleManager`] owns the cached token pair and refreshes it
//! lazily; [`ResourceClient`] uses it for every authenticated call.

pub mod api;
pub mod config;
pub mod credential;
pub mod error;
pub mod manager;
pub mod token_endpoint;

pub use api::{ResourceClient, ResourceKind};
pub use config::ClientConfig;
pub use credential::{Credential, CredentialState, CredentialStore};
pub use error::ClientError;
pub use manager::CredentialLifecycleManager;
pub use token_endpoint::{AuthType, HttpTokenEndpoint, TokenEndpoint, TokenResponse};
