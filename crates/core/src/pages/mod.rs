//! Chapter page storage.
//!
//! Pages are only ever created in batches by the sequencer. The store's
//! uniqueness constraint on `(chapter_id, page_number)` is what keeps two
//! concurrent uploads from claiming the same numbers.

mod sqlite;
mod types;

pub use sqlite::SqlitePageStore;
pub use types::*;

use async_trait::async_trait;

/// Trait for page storage backends.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Whether `insert_pages` is all-or-nothing for a multi-record slice.
    ///
    /// Stores that return `false` may leave a prefix of the slice persisted
    /// when an insert fails part way.
    fn atomic_batches(&self) -> bool;

    /// Highest page number recorded for the chapter, `None` if it has no pages.
    async fn max_page_number(&self, chapter_id: &str) -> Result<Option<u32>, StoreError>;

    /// Insert page records, returning their ids in input order.
    async fn insert_pages(&self, pages: &[NewPage]) -> Result<Vec<PageId>, StoreError>;

    /// Delete page records by id. Unknown ids are ignored.
    async fn delete_pages(&self, ids: &[PageId]) -> Result<(), StoreError>;

    /// All pages of a chapter ordered by page number.
    async fn list_pages(&self, chapter_id: &str) -> Result<Vec<Page>, StoreError>;
}
