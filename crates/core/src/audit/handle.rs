use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::AuditEvent;

/// An event queued for the writer, stamped when it was emitted.
#[derive(Debug, Clone)]
pub struct AuditEventEnvelope {
    pub timestamp: DateTime<Utc>,
    /// Correlation id of the HTTP request that caused the event.
    pub request_id: Option<String>,
    pub event: AuditEvent,
}

/// Cloneable sender side of the audit trail.
///
/// Emitting never fails the caller: an upload that committed stays committed
/// even when its audit event cannot be queued.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEventEnvelope>,
}

impl AuditHandle {
    pub fn new(tx: mpsc::Sender<AuditEventEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an event that belongs to no request (service lifecycle).
    pub async fn emit(&self, event: AuditEvent) {
        self.send(None, event).await;
    }

    /// Emit an event on behalf of a request, waiting for channel capacity.
    pub async fn emit_for_request(&self, request_id: Option<&str>, event: AuditEvent) {
        self.send(request_id.map(String::from), event).await;
    }

    async fn send(&self, request_id: Option<String>, event: AuditEvent) {
        let event_type = event.event_type();
        let envelope = AuditEventEnvelope {
            timestamp: Utc::now(),
            request_id,
            event,
        };
        if self.tx.send(envelope).await.is_err() {
            tracing::error!(event_type, "Audit writer is gone, dropping event");
        }
    }
}
