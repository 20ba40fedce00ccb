//! Grants carried inside access tokens.
//!
//! A grant is a closed (target, action, scope) triple. Authorization is a
//! structural match over these variants; no string parsing happens at
//! decision time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Tenant-scoped resource kinds the service manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Project,
    Client,
    User,
    Role,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Project,
        ResourceKind::Client,
        ResourceKind::User,
        ResourceKind::Role,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Project => "project",
            ResourceKind::Client => "client",
            ResourceKind::User => "user",
            ResourceKind::Role => "role",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(ResourceKind::Project),
            "client" => Ok(ResourceKind::Client),
            "user" => Ok(ResourceKind::User),
            "role" => Ok(ResourceKind::Role),
            _ => Err(format!("unknown resource kind '{}'", s)),
        }
    }
}

/// Read and Write are checked independently; Write does not imply Read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Read => f.write_str("read"),
            Action::Write => f.write_str("write"),
        }
    }
}

/// What a grant applies to: one resource kind or every kind (`*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GrantTarget {
    All,
    Kind(ResourceKind),
}

impl GrantTarget {
    pub fn covers(&self, kind: ResourceKind) -> bool {
        match self {
            GrantTarget::All => true,
            GrantTarget::Kind(k) => *k == kind,
        }
    }
}

impl TryFrom<String> for GrantTarget {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "*" {
            return Ok(GrantTarget::All);
        }
        value.parse().map(GrantTarget::Kind)
    }
}

impl From<GrantTarget> for String {
    fn from(target: GrantTarget) -> Self {
        match target {
            GrantTarget::All => "*".to_string(),
            GrantTarget::Kind(kind) => kind.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantScope {
    Global,
    Tenant(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub target: GrantTarget,
    pub action: Action,
    pub scope: GrantScope,
}

impl Grant {
    pub fn new(target: GrantTarget, action: Action, scope: GrantScope) -> Self {
        Self {
            target,
            action,
            scope,
        }
    }

    /// `tenant` is `None` for collection-level project operations, which
    /// only a global grant can satisfy.
    pub fn satisfies(&self, tenant: Option<&str>, kind: ResourceKind, action: Action) -> bool {
        let scope_ok = match (&self.scope, tenant) {
            (GrantScope::Global, _) => true,
            (GrantScope::Tenant(own), Some(requested)) => own == requested,
            (GrantScope::Tenant(_), None) => false,
        };
        scope_ok && self.action == action && self.target.covers(kind)
    }
}
