use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ResourceKind;

/// One record per mutating request. `message` is empty on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub tenant: String,
    pub time: DateTime<Utc>,
    pub resource_kind: ResourceKind,
    pub verb: String,
    pub target: String,
    pub message: String,
}

impl AuditEntry {
    pub fn is_success(&self) -> bool {
        self.message.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub offset: usize,
    pub limit: usize,
}

impl AuditQuery {
    pub const PAGE_SIZE: usize = 100;

    /// Defaults to the last 24 hours ending at `now`.
    pub fn window(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        offset: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let to = to.unwrap_or(now);
        let from = from.unwrap_or(to - Duration::hours(24));
        Self {
            from,
            to,
            offset,
            limit: Self::PAGE_SIZE,
        }
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.from <= time && time <= self.to
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditEntryView {
    pub time: DateTime<Utc>,
    pub resource_type: ResourceKind,
    pub method: String,
    pub path: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl From<AuditEntry> for AuditEntryView {
    fn from(entry: AuditEntry) -> Self {
        Self {
            success: entry.is_success(),
            time: entry.time,
            resource_type: entry.resource_kind,
            method: entry.verb,
            path: entry.target,
            message: entry.message,
        }
    }
}
