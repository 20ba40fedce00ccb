//! HTTP handlers for identity-service.
//!
//! Mutating handlers open a [`PendingAudit`](crate::services::PendingAudit)
//! before doing anything else, so authorization and body rejections are
//! recorded like any other outcome. Reads are not audited.

pub mod audit;
pub mod client;
pub mod project;
pub mod role;
pub mod token;
pub mod user;

pub use audit::*;
pub use client::*;
pub use project::*;
pub use role::*;
pub use token::*;
pub use user::*;

use crate::dtos::ListParams;
use crate::services::ListFilter;

impl From<ListParams> for ListFilter {
    fn from(params: ListParams) -> Self {
        ListFilter {
            prefix: params.prefix,
        }
    }
}
