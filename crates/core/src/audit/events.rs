use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Page uploads
    /// A batch was committed as pages `start_page..=end_page`.
    PagesCommitted {
        chapter_id: String,
        requested_by: String,
        start_page: u32,
        end_page: u32,
        count: usize,
        attempts: u32,
    },
    /// A concurrent upload claimed one of the assigned numbers; the batch is
    /// being renumbered from a fresh watermark.
    UploadConflictRetried {
        chapter_id: String,
        requested_by: String,
        attempt: u32,
        page_number: u32,
    },
    /// The upload ended without committing anything.
    UploadFailed {
        chapter_id: String,
        requested_by: String,
        file_count: usize,
        error_kind: String,
        message: String,
    },
}

impl AuditEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::PagesCommitted { .. } => "pages_committed",
            Self::UploadConflictRetried { .. } => "upload_conflict_retried",
            Self::UploadFailed { .. } => "upload_failed",
        }
    }

    pub fn chapter_id(&self) -> Option<&str> {
        match self {
            Self::PagesCommitted { chapter_id, .. }
            | Self::UploadConflictRetried { chapter_id, .. }
            | Self::UploadFailed { chapter_id, .. } => Some(chapter_id),
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::PagesCommitted { requested_by, .. }
            | Self::UploadConflictRetried { requested_by, .. }
            | Self::UploadFailed { requested_by, .. } => Some(requested_by),
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
        }
    }
}

/// A persisted audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub chapter_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub data: AuditEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = AuditEvent::PagesCommitted {
            chapter_id: "ch-1".to_string(),
            requested_by: "editor".to_string(),
            start_page: 4,
            end_page: 5,
            count: 2,
            attempts: 1,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "pages_committed");
        assert_eq!(json["start_page"], 4);

        let parsed: AuditEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_event_accessors() {
        let event = AuditEvent::UploadFailed {
            chapter_id: "ch-9".to_string(),
            requested_by: "editor".to_string(),
            file_count: 3,
            error_kind: "page_number_conflict".to_string(),
            message: "conflict".to_string(),
        };
        assert_eq!(event.event_type(), "upload_failed");
        assert_eq!(event.chapter_id(), Some("ch-9"));
        assert_eq!(event.user_id(), Some("editor"));

        let event = AuditEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        };
        assert_eq!(event.event_type(), "service_stopped");
        assert!(event.chapter_id().is_none());
        assert!(event.user_id().is_none());
    }
}
