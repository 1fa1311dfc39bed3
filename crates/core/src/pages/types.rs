//! Types for chapter page records.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store-assigned page identifier.
pub type PageId = i64;

/// A page record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPage {
    /// Chapter the page belongs to.
    pub chapter_id: String,
    /// Position of the page within the chapter (1-based).
    pub page_number: u32,
    /// Opaque image locator.
    pub image_ref: String,
}

/// A persisted page record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub chapter_id: String,
    pub page_number: u32,
    pub image_ref: String,
    pub created_at: DateTime<Utc>,
}

/// Errors reported by a page store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// `(chapter_id, page_number)` is already taken.
    #[error("Page {page_number} already exists in chapter {chapter_id}")]
    UniqueViolation { chapter_id: String, page_number: u32 },

    /// The store could not complete the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// No answer within the caller's bound. The request may still complete.
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    TimedOut { operation: String, after: Duration },
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    /// Whether the outcome of the request is unknown.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::UniqueViolation {
            chapter_id: "ch-1".to_string(),
            page_number: 4,
        };
        assert_eq!(err.to_string(), "Page 4 already exists in chapter ch-1");
        assert!(err.is_unique_violation());

        let err = StoreError::Unavailable("connection reset".to_string());
        assert_eq!(err.to_string(), "Store unavailable: connection reset");
        assert!(!err.is_unique_violation());
        assert!(!err.is_timeout());

        let err = StoreError::TimedOut {
            operation: "insert_pages".to_string(),
            after: Duration::from_millis(200),
        };
        assert_eq!(err.to_string(), "insert_pages timed out after 200ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_page_serialization() {
        let page = Page {
            id: 7,
            chapter_id: "ch-1".to_string(),
            page_number: 3,
            image_ref: "scan-003.png".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["page_number"], 3);
        assert_eq!(json["image_ref"], "scan-003.png");
    }
}
