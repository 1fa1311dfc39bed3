//! Prometheus metrics for core components.
//!
//! This module provides metrics for the page sequencer: upload outcomes,
//! committed pages, conflict retries, rollbacks and upload latency.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Sequencer - Upload Metrics
// =============================================================================

/// Upload invocations by terminal result.
pub static UPLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("manga_admin_uploads_total", "Total page batch uploads"),
        &["result"], // "committed" or an error kind such as "page_number_conflict"
    )
    .expect("valid uploads_total metric")
});

/// Upload duration in seconds, including conflict retries.
pub static UPLOAD_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "manga_admin_upload_duration_seconds",
            "Duration of page batch uploads",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["result"],
    )
    .expect("valid upload_duration metric")
});

/// Pages committed total.
pub static PAGES_COMMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "manga_admin_pages_committed_total",
        "Total pages committed by the sequencer",
    )
    .expect("valid pages_committed metric")
});

/// Conflict retries total.
pub static CONFLICT_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "manga_admin_conflict_retries_total",
        "Uploads renumbered after a concurrent upload claimed their page numbers",
    )
    .expect("valid conflict_retries metric")
});

/// Rollbacks of partially inserted batches, by outcome.
pub static ROLLBACKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "manga_admin_rollbacks_total",
            "Partially inserted batches that were deleted again",
        ),
        &["result"], // "success", "failed", "unverified"
    )
    .expect("valid rollbacks_total metric")
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(UPLOADS_TOTAL.clone()),
        Box::new(UPLOAD_DURATION.clone()),
        Box::new(PAGES_COMMITTED.clone()),
        Box::new(CONFLICT_RETRIES.clone()),
        Box::new(ROLLBACKS_TOTAL.clone()),
    ]
}
