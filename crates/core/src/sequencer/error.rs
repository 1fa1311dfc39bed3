//! Error types for the page sequencer.

use thiserror::Error;

use crate::pages::PageId;

/// Errors that can end an upload invocation.
///
/// Every variant except `CleanupFailed` leaves the chapter without any
/// record from the failed batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencerError {
    /// The batch contained no files.
    #[error("Upload batch is empty")]
    EmptyBatch,

    /// The batch exceeds the configured size limit.
    #[error("Upload batch has {size} files, limit is {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// Page numbers would run past the representable range.
    #[error("Chapter {chapter_id} cannot take {count} more pages after page {watermark}")]
    PageNumberOverflow {
        chapter_id: String,
        watermark: u32,
        count: usize,
    },

    /// A store call failed or timed out before anything was written.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Concurrent uploads kept claiming the assigned page numbers.
    #[error("Page numbers in chapter {chapter_id} were taken by a concurrent upload ({attempts} attempts)")]
    PageNumberConflict { chapter_id: String, attempts: u32 },

    /// Some pages were written before a failure and have been removed again.
    #[error("Upload to chapter {chapter_id} failed after {inserted} pages were written and removed again: {reason}")]
    PartialFailureRecovered {
        chapter_id: String,
        inserted: usize,
        reason: String,
    },

    /// The caller cancelled the upload.
    #[error("Upload cancelled")]
    Cancelled,

    /// Removing a partial batch failed; the listed pages remain in the store.
    #[error("Cleanup failed in chapter {chapter_id}, {} pages left behind: {reason}", .orphaned.len())]
    CleanupFailed {
        chapter_id: String,
        orphaned: Vec<PageId>,
        reason: String,
    },
}

impl SequencerError {
    /// Stable snake_case name, used for metrics labels and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyBatch => "empty_batch",
            Self::BatchTooLarge { .. } => "batch_too_large",
            Self::PageNumberOverflow { .. } => "page_number_overflow",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::PageNumberConflict { .. } => "page_number_conflict",
            Self::PartialFailureRecovered { .. } => "partial_failure_recovered",
            Self::Cancelled => "cancelled",
            Self::CleanupFailed { .. } => "cleanup_failed",
        }
    }

    /// Whether re-submitting the same batch later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_)
                | Self::PageNumberConflict { .. }
                | Self::PartialFailureRecovered { .. }
        )
    }

    /// Whether the error was raised before contacting the store.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::EmptyBatch | Self::BatchTooLarge { .. })
    }
}
