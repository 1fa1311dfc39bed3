//! Types for the page sequencer.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pages::PageId;

/// Files submitted together by one upload action.
///
/// File order is numbering order: the first file receives the lowest page
/// number of the assigned range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBatch {
    pub chapter_id: String,
    pub files: Vec<String>,
}

impl UploadBatch {
    pub fn new<I, S>(chapter_id: impl Into<String>, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chapter_id: chapter_id.into(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Caller-owned request context for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadContext {
    /// Identity of the staff member submitting the batch.
    pub requested_by: String,
    /// Correlation id from the surrounding request, if any.
    pub request_id: Option<String>,
}

impl UploadContext {
    pub fn new(requested_by: impl Into<String>) -> Self {
        Self {
            requested_by: requested_by.into(),
            request_id: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Result of a committed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub chapter_id: String,
    /// First page number of the committed range.
    pub start: u32,
    /// Last page number of the committed range (inclusive).
    pub end: u32,
    /// Pages written.
    pub count: usize,
    /// Attempts made, 1 when no conflict occurred.
    pub attempts: u32,
    /// Ids of the new pages in page-number order.
    pub page_ids: Vec<PageId>,
}

impl UploadOutcome {
    pub fn range(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }
}

/// Phase of a single upload invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerPhase {
    Idle,
    ResolvingWatermark,
    Assigning,
    Committing,
    ConflictRetry,
    Committed,
    Failed,
}

impl SequencerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ResolvingWatermark => "resolving_watermark",
            Self::Assigning => "assigning",
            Self::Committing => "committing",
            Self::ConflictRetry => "conflict_retry",
            Self::Committed => "committed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }
}

impl fmt::Display for SequencerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback invoked on every phase transition with `(chapter_id, phase)`.
pub type PhaseObserver = Arc<dyn Fn(&str, SequencerPhase) + Send + Sync>;
