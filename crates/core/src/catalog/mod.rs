//! Manga catalog - series and their chapters.
//!
//! The upload surface reads the catalog to resolve which chapter a batch
//! targets; pages themselves live in [`crate::pages`].

mod sqlite;
mod types;

pub use sqlite::SqliteCatalog;
pub use types::*;

/// Trait for catalog storage.
pub trait CatalogStore: Send + Sync {
    /// Create a manga series.
    fn create_manga(&self, request: NewManga) -> Result<Manga, CatalogError>;

    /// List all manga ordered by title.
    fn list_manga(&self) -> Result<Vec<Manga>, CatalogError>;

    /// Get a manga by ID.
    fn get_manga(&self, id: &str) -> Result<Option<Manga>, CatalogError>;

    /// Create a chapter. Fails with `NotFound` if the manga does not exist.
    fn create_chapter(&self, request: NewChapter) -> Result<Chapter, CatalogError>;

    /// List a manga's chapters ordered by chapter number.
    fn list_chapters(&self, manga_id: &str) -> Result<Vec<Chapter>, CatalogError>;

    /// Get a chapter by ID.
    fn get_chapter(&self, id: &str) -> Result<Option<Chapter>, CatalogError>;
}
