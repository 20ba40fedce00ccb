pub mod audit;
pub mod client;
pub mod grant;
pub mod project;
pub mod role;
pub mod session;
pub mod user;

pub use audit::{AuditEntry, AuditEntryView, AuditQuery};
pub use client::{AccessType, Client, ClientDelta, ClientSpec, ClientView};
pub use grant::{Action, Grant, GrantScope, GrantTarget, ResourceKind};
pub use project::{Project, ProjectDelta, ProjectSpec, SigningAlgorithm, TokenPolicy};
pub use role::{Role, RoleDelta, RoleSpec, RoleType};
pub use session::RefreshSession;
pub use user::{User, UserDelta, UserSpec, UserView};
