pub mod audit;
pub mod authz;
pub mod bootstrap;
pub mod error;
pub mod jwt;
pub mod lifecycle;
pub mod project;
pub mod store;
pub mod token;

pub use audit::{AuditRecorder, AuditSink, MemoryAuditSink, PendingAudit};
pub use authz::{AuthorizationGate, AuthzError};
pub use bootstrap::{ensure_admin, CLUSTER_ADMIN_ROLE};
pub use error::ServiceError;
pub use jwt::{AccessClaims, JwtService, RefreshClaims, TokenError, TokenUse};
pub use lifecycle::{Dependents, ListFilter, ManagedResource, ResourceLifecycleManager};
pub use project::ProjectManager;
pub use store::{MemoryStore, PgStore, ResourceStore, StoreError};
pub use token::{AuthType, TokenPair, TokenService};
