//! Testing utilities and mock implementations.
//!
//! This module provides an in-memory page store with injectable failures,
//! latency and race control, allowing the sequencer to be tested without a
//! database.
//!
//! # Example
//!
//! ```rust,ignore
//! use manga_admin_core::testing::{fixtures, MockPageStore};
//!
//! let store = MockPageStore::new();
//! store.hold_reads(2).await; // both uploads see the same watermark
//!
//! let sequencer = Sequencer::new(Arc::new(store.clone()), fixtures::sequencer_config());
//! ```

mod mock_page_store;

pub use mock_page_store::{MockPageStore, STOLEN_IMAGE_REF};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::time::Duration;

    use crate::catalog::{NewChapter, NewManga};
    use crate::sequencer::{SequencerConfig, UploadBatch};

    /// Sequencer config with a short store timeout so failing tests finish quickly.
    pub fn sequencer_config() -> SequencerConfig {
        SequencerConfig::default().with_store_timeout(Duration::from_millis(500))
    }

    /// File names `{prefix}-001.png`, `{prefix}-002.png`, ...
    pub fn scan_files(prefix: &str, count: usize) -> Vec<String> {
        (1..=count)
            .map(|i| format!("{}-{:03}.png", prefix, i))
            .collect()
    }

    /// A batch of `count` scans for a chapter.
    pub fn upload_batch(chapter_id: &str, count: usize) -> UploadBatch {
        UploadBatch::new(chapter_id, scan_files(chapter_id, count))
    }

    /// A manga with a title and no description.
    pub fn manga(title: &str) -> NewManga {
        NewManga::new(title)
    }

    /// A chapter of `manga_id` with the given number.
    pub fn chapter(manga_id: &str, number: f64) -> NewChapter {
        NewChapter::new(manga_id, number)
    }
}
