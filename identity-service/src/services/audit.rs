//! Audit trail for mutating requests.
//!
//! A [`PendingAudit`] is taken when a request starts and written exactly once
//! when it finishes, whatever the outcome. The sink's own failures are only
//! logged; they never reach the caller.

use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::models::{AuditEntry, AuditQuery, ResourceKind};

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> anyhow::Result<()>;

    /// Entries for `tenant` inside the query window, newest first.
    async fn query(&self, tenant: &str, query: &AuditQuery) -> anyhow::Result<Vec<AuditEntry>>;
}

/// In-process sink, used with the memory store and in tests.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: &AuditEntry) -> anyhow::Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("audit log lock poisoned"))?
            .push(entry.clone());
        Ok(())
    }

    async fn query(&self, tenant: &str, query: &AuditQuery) -> anyhow::Result<Vec<AuditEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("audit log lock poisoned"))?;

        let mut matching: Vec<AuditEntry> = entries
            .iter()
            .filter(|entry| entry.tenant == tenant && query.contains(entry.time))
            .cloned()
            .collect();
        // stable sort keeps insertion order among equal timestamps, then reverse
        matching.sort_by_key(|entry| entry.time);
        matching.reverse();

        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }
}

#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Opens the audit context for a request. The timestamp is taken now.
    pub fn begin(
        &self,
        tenant: &str,
        kind: ResourceKind,
        verb: &str,
        target: &str,
    ) -> PendingAudit {
        PendingAudit {
            sink: self.sink.clone(),
            entry: Some(AuditEntry {
                tenant: tenant.to_string(),
                time: Utc::now(),
                resource_kind: kind,
                verb: verb.to_string(),
                target: target.to_string(),
                message: String::new(),
            }),
        }
    }

    pub async fn query(&self, tenant: &str, query: &AuditQuery) -> anyhow::Result<Vec<AuditEntry>> {
        self.sink.query(tenant, query).await
    }
}

/// Guard for one request's audit entry.
///
/// Finalized by [`PendingAudit::run`]. If the request future is dropped
/// before that, the entry is written from `Drop` with an aborted outcome.
pub struct PendingAudit {
    sink: Arc<dyn AuditSink>,
    entry: Option<AuditEntry>,
}

impl PendingAudit {
    /// Runs the request body and records its outcome. The returned value is
    /// always the body's own result.
    pub async fn run<T, F>(mut self, operation: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let outcome = operation.await;
        let message = match &outcome {
            Ok(_) => String::new(),
            Err(err) => err.to_string(),
        };
        self.finish(message).await;
        outcome
    }

    async fn finish(&mut self, message: String) {
        let Some(mut entry) = self.entry.take() else {
            return;
        };
        entry.message = message;

        if let Err(err) = self.sink.record(&entry).await {
            tracing::error!(
                error = %err,
                tenant = %entry.tenant,
                resource_kind = %entry.resource_kind,
                verb = %entry.verb,
                target = %entry.target,
                success = entry.is_success(),
                "Failed to write audit entry"
            );
        }
    }
}

impl Drop for PendingAudit {
    fn drop(&mut self) {
        let Some(mut entry) = self.entry.take() else {
            return;
        };
        entry.message = "request aborted before completion".to_string();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sink = self.sink.clone();
                handle.spawn(async move {
                    if let Err(err) = sink.record(&entry).await {
                        tracing::error!(
                            error = %err,
                            tenant = %entry.tenant,
                            target = %entry.target,
                            "Failed to write audit entry for aborted request"
                        );
                    }
                });
            }
            Err(_) => {
                tracing::error!(
                    tenant = %entry.tenant,
                    target = %entry.target,
                    "Audit entry lost: no runtime available"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn record(&self, _entry: &AuditEntry) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("disk full"))
        }

        async fn query(&self, _: &str, _: &AuditQuery) -> anyhow::Result<Vec<AuditEntry>> {
            Ok(vec![])
        }
    }

    fn recorder() -> (AuditRecorder, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        (AuditRecorder::new(sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_success_records_empty_message() {
        let (recorder, sink) = recorder();

        let result = recorder
            .begin("acme", ResourceKind::Client, "POST", "/api/v1/project/acme/client")
            .run(async { Ok::<_, AppError>(7) })
            .await;

        assert_eq!(result.unwrap(), 7);
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_success());
        assert_eq!(entries[0].verb, "POST");
    }

    #[tokio::test]
    async fn test_failure_records_error_message() {
        let (recorder, sink) = recorder();

        let result: Result<(), AppError> = recorder
            .begin("acme", ResourceKind::Client, "DELETE", "/api/v1/project/acme/client/x")
            .run(async { Err(AppError::NotFound("client 'x' not found".into())) })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Not found: client 'x' not found");
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_change_outcome() {
        let recorder = AuditRecorder::new(Arc::new(FailingSink));

        let ok = recorder
            .begin("acme", ResourceKind::Role, "PUT", "/x")
            .run(async { Ok::<_, AppError>("done") })
            .await;
        assert_eq!(ok.unwrap(), "done");

        let err: Result<(), AppError> = recorder
            .begin("acme", ResourceKind::Role, "PUT", "/x")
            .run(async { Err(AppError::Forbidden("nope".into())) })
            .await;
        assert!(matches!(err, Err(AppError::Forbidden(msg)) if msg == "nope"));
    }

    #[tokio::test]
    async fn test_dropped_request_is_still_recorded() {
        let (recorder, sink) = recorder();

        let pending = recorder.begin("acme", ResourceKind::User, "POST", "/x");
        drop(pending);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].is_success());
    }

    #[tokio::test]
    async fn test_query_window_and_order() {
        let sink = MemoryAuditSink::new();
        let now = Utc::now();
        for (tenant, minutes_ago, target) in [
            ("acme", 90, "/old"),
            ("acme", 10, "/new"),
            ("globex", 5, "/other"),
            ("acme", 60 * 30, "/ancient"),
        ] {
            sink.record(&AuditEntry {
                tenant: tenant.to_string(),
                time: now - Duration::minutes(minutes_ago),
                resource_kind: ResourceKind::Client,
                verb: "POST".to_string(),
                target: target.to_string(),
                message: String::new(),
            })
            .await
            .unwrap();
        }

        let page = sink
            .query("acme", &AuditQuery::window(None, None, 0, now))
            .await
            .unwrap();
        let targets: Vec<_> = page.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["/new", "/old"]);

        let page = sink
            .query("acme", &AuditQuery::window(None, None, 1, now))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].target, "/old");
    }
}
