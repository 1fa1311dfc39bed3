use std::sync::Arc;

use tokio::sync::mpsc;

use super::{AuditEventEnvelope, AuditHandle, AuditRecord, AuditStore};

/// Totals reported by the writer when its channel closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterSummary {
    pub written: u64,
    pub failed: u64,
}

/// Drains queued events into an [`AuditStore`].
pub struct AuditWriter {
    rx: mpsc::Receiver<AuditEventEnvelope>,
    store: Arc<dyn AuditStore>,
}

impl AuditWriter {
    pub fn new(rx: mpsc::Receiver<AuditEventEnvelope>, store: Arc<dyn AuditStore>) -> Self {
        Self { rx, store }
    }

    /// Write events until every [`AuditHandle`] is dropped.
    ///
    /// A failed insert is logged and skipped.
    pub async fn run(mut self) -> WriterSummary {
        tracing::info!("Audit writer started");
        let mut summary = WriterSummary::default();

        while let Some(envelope) = self.rx.recv().await {
            let record = AuditRecord::from(envelope);
            match self.store.insert(&record) {
                Ok(_) => summary.written += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        event_type = %record.event_type,
                        chapter_id = ?record.chapter_id,
                        error = %e,
                        "Failed to write audit event"
                    );
                }
            }
        }

        tracing::info!(
            written = summary.written,
            failed = summary.failed,
            "Audit writer shutting down"
        );
        summary
    }
}

impl From<AuditEventEnvelope> for AuditRecord {
    fn from(envelope: AuditEventEnvelope) -> Self {
        Self {
            id: 0,
            timestamp: envelope.timestamp,
            event_type: envelope.event.event_type().to_string(),
            chapter_id: envelope.event.chapter_id().map(String::from),
            user_id: envelope.event.user_id().map(String::from),
            request_id: envelope.request_id,
            data: envelope.event,
        }
    }
}

/// Create the audit handle and the writer that serves it.
///
/// Spawn the writer with `tokio::spawn(writer.run())`. Emitters wait once
/// `buffer_size` events are queued.
pub fn create_audit_system(
    store: Arc<dyn AuditStore>,
    buffer_size: usize,
) -> (AuditHandle, AuditWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (AuditHandle::new(tx), AuditWriter::new(rx, store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEvent, SqliteAuditStore};
    use crate::audit::{AuditError, AuditFilter};

    /// Rejects every insert.
    struct BrokenStore;

    impl AuditStore for BrokenStore {
        fn insert(&self, _record: &AuditRecord) -> Result<i64, AuditError> {
            Err(AuditError::Database("disk full".to_string()))
        }

        fn query(&self, _filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
            Ok(Vec::new())
        }

        fn count(&self, _filter: &AuditFilter) -> Result<i64, AuditError> {
            Ok(0)
        }
    }

    fn failed_upload() -> AuditEvent {
        AuditEvent::UploadFailed {
            chapter_id: "ch-1".to_string(),
            requested_by: "alice".to_string(),
            file_count: 2,
            error_kind: "page_number_conflict".to_string(),
            message: "conflict".to_string(),
        }
    }

    #[tokio::test]
    async fn test_writer_persists_correlated_events() {
        let store = Arc::new(SqliteAuditStore::in_memory().unwrap());
        let (handle, writer) = create_audit_system(Arc::clone(&store) as Arc<dyn AuditStore>, 8);
        let writer_task = tokio::spawn(writer.run());

        handle
            .emit_for_request(Some("req-7"), failed_upload())
            .await;
        handle
            .emit(AuditEvent::ServiceStopped {
                reason: "test".to_string(),
            })
            .await;
        drop(handle);

        let summary = writer_task.await.unwrap();
        assert_eq!(summary, WriterSummary { written: 2, failed: 0 });

        let records = store
            .query(&AuditFilter::new().with_request_id("req-7"))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "upload_failed");
        assert_eq!(records[0].chapter_id.as_deref(), Some("ch-1"));
        assert_eq!(records[0].user_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_writer_counts_store_failures() {
        let (handle, writer) = create_audit_system(Arc::new(BrokenStore), 8);
        let writer_task = tokio::spawn(writer.run());

        handle.emit_for_request(None, failed_upload()).await;
        handle.emit_for_request(None, failed_upload()).await;
        drop(handle);

        let summary = writer_task.await.unwrap();
        assert_eq!(summary.written, 0);
        assert_eq!(summary.failed, 2);
    }
}
