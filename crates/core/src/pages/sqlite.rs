//! SQLite-backed page store implementation.
//!
//! rusqlite is synchronous, so every call runs on the blocking pool. A caller
//! that stops waiting gets control back right away while the statement
//! finishes on its own thread.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};

use super::{NewPage, Page, PageId, PageStore, StoreError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed page store.
///
/// Batches are inserted inside a single transaction by default. A store built
/// with [`SqlitePageStore::per_record`] inserts row by row without a
/// transaction, the way a plain REST table endpoint behaves.
pub struct SqlitePageStore {
    conn: Arc<Mutex<Connection>>,
    atomic: bool,
}

impl SqlitePageStore {
    /// Create a new SQLite page store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(unavailable)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(unavailable)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            atomic: true,
        })
    }

    /// Create an in-memory SQLite page store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            atomic: true,
        })
    }

    /// Switch to row-by-row inserts without a wrapping transaction.
    pub fn per_record(mut self) -> Self {
        self.atomic = false;
        self
    }

    /// How long a statement waits for another connection's lock before
    /// failing with "database is locked".
    pub fn with_busy_timeout(self, timeout: Duration) -> Result<Self, StoreError> {
        lock(&self.conn)?
            .busy_timeout(timeout)
            .map_err(unavailable)?;
        Ok(self)
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chapter_id TEXT NOT NULL,
                page_number INTEGER NOT NULL CHECK (page_number > 0),
                image_ref TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(chapter_id, page_number)
            );

            CREATE INDEX IF NOT EXISTS idx_pages_chapter_id ON pages(chapter_id);
            "#,
        )
        .map_err(unavailable)?;

        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("page store task failed: {}", e)))?
    }

    fn insert_one(conn: &Connection, page: &NewPage, now: &str) -> Result<PageId, StoreError> {
        conn.execute(
            "INSERT INTO pages (chapter_id, page_number, image_ref, created_at) VALUES (?, ?, ?, ?)",
            params![page.chapter_id, page.page_number, page.image_ref, now],
        )
        .map_err(|e| classify_insert_error(e, page))?;

        Ok(conn.last_insert_rowid())
    }

    fn row_to_page(row: &rusqlite::Row) -> rusqlite::Result<Page> {
        let created_at_str: String = row.get(4)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Page {
            id: row.get(0)?,
            chapter_id: row.get(1)?,
            page_number: row.get(2)?,
            image_ref: row.get(3)?,
            created_at,
        })
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
    conn.lock()
        .map_err(|_| StoreError::Unavailable("page store lock poisoned".to_string()))
}

fn unavailable(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn classify_insert_error(e: rusqlite::Error, page: &NewPage) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::UniqueViolation {
                chapter_id: page.chapter_id.clone(),
                page_number: page.page_number,
            }
        }
        _ => unavailable(e),
    }
}

#[async_trait]
impl PageStore for SqlitePageStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn atomic_batches(&self) -> bool {
        self.atomic
    }

    async fn max_page_number(&self, chapter_id: &str) -> Result<Option<u32>, StoreError> {
        let chapter_id = chapter_id.to_string();
        self.with_connection(move |conn| {
            conn.query_row(
                "SELECT MAX(page_number) FROM pages WHERE chapter_id = ?",
                params![chapter_id],
                |row| row.get::<_, Option<u32>>(0),
            )
            .map_err(unavailable)
        })
        .await
    }

    async fn insert_pages(&self, pages: &[NewPage]) -> Result<Vec<PageId>, StoreError> {
        let pages = pages.to_vec();
        let atomic = self.atomic;

        self.with_connection(move |conn| {
            let now = Utc::now().to_rfc3339();

            if !atomic {
                return pages
                    .iter()
                    .map(|page| Self::insert_one(conn, page, &now))
                    .collect();
            }

            // Dropping the transaction on an early return rolls it back.
            let tx = conn.transaction().map_err(unavailable)?;
            let mut ids = Vec::with_capacity(pages.len());
            for page in &pages {
                ids.push(Self::insert_one(&tx, page, &now)?);
            }
            tx.commit().map_err(unavailable)?;

            Ok(ids)
        })
        .await
    }

    async fn delete_pages(&self, ids: &[PageId]) -> Result<(), StoreError> {
        let ids = ids.to_vec();
        self.with_connection(move |conn| {
            let tx = conn.transaction().map_err(unavailable)?;
            for id in &ids {
                tx.execute("DELETE FROM pages WHERE id = ?", params![id])
                    .map_err(unavailable)?;
            }
            tx.commit().map_err(unavailable)
        })
        .await
    }

    async fn list_pages(&self, chapter_id: &str) -> Result<Vec<Page>, StoreError> {
        let chapter_id = chapter_id.to_string();
        self.with_connection(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, chapter_id, page_number, image_ref, created_at
                     FROM pages WHERE chapter_id = ? ORDER BY page_number ASC",
                )
                .map_err(unavailable)?;

            let rows = stmt
                .query_map(params![chapter_id], Self::row_to_page)
                .map_err(unavailable)?;

            let mut pages = Vec::new();
            for row in rows {
                pages.push(row.map_err(unavailable)?);
            }
            Ok(pages)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_page(chapter_id: &str, page_number: u32) -> NewPage {
        NewPage {
            chapter_id: chapter_id.to_string(),
            page_number,
            image_ref: format!("{}-{}.jpg", chapter_id, page_number),
        }
    }

    #[tokio::test]
    async fn test_max_page_number_empty_chapter() {
        let store = SqlitePageStore::in_memory().unwrap();
        let max = tokio_test::assert_ok!(store.max_page_number("ch-1").await);
        assert_eq!(max, None);
    }

    #[tokio::test]
    async fn test_insert_and_list_pages() {
        let store = SqlitePageStore::in_memory().unwrap();
        let ids = store
            .insert_pages(&[new_page("ch-1", 2), new_page("ch-1", 1)])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let pages = store.list_pages("ch-1").await.unwrap();
        let numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(pages[1].id, ids[0]);
        assert_eq!(store.max_page_number("ch-1").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_watermarks_are_per_chapter() {
        let store = SqlitePageStore::in_memory().unwrap();
        store
            .insert_pages(&[new_page("ch-1", 1), new_page("ch-1", 2)])
            .await
            .unwrap();
        store.insert_pages(&[new_page("ch-2", 1)]).await.unwrap();

        assert_eq!(store.max_page_number("ch-1").await.unwrap(), Some(2));
        assert_eq!(store.max_page_number("ch-2").await.unwrap(), Some(1));
        assert_eq!(store.max_page_number("ch-3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unique_violation_rolls_back_whole_batch() {
        let store = SqlitePageStore::in_memory().unwrap();
        store.insert_pages(&[new_page("ch-1", 3)]).await.unwrap();

        let err = store
            .insert_pages(&[new_page("ch-1", 1), new_page("ch-1", 2), new_page("ch-1", 3)])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StoreError::UniqueViolation {
                chapter_id: "ch-1".to_string(),
                page_number: 3,
            }
        );
        let numbers: Vec<u32> = store
            .list_pages("ch-1")
            .await
            .unwrap()
            .iter()
            .map(|p| p.page_number)
            .collect();
        assert_eq!(numbers, vec![3]);
    }

    #[tokio::test]
    async fn test_per_record_store_keeps_prefix_on_violation() {
        let store = SqlitePageStore::in_memory().unwrap().per_record();
        assert!(!store.atomic_batches());
        store.insert_pages(&[new_page("ch-1", 2)]).await.unwrap();

        let err = store
            .insert_pages(&[new_page("ch-1", 1), new_page("ch-1", 2)])
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        // Page 1 landed before the violation and stays behind.
        assert_eq!(store.list_pages("ch-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_positive_page_number_is_not_a_conflict() {
        let store = SqlitePageStore::in_memory().unwrap();
        let err = store
            .insert_pages(&[new_page("ch-1", 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_delete_pages() {
        let store = SqlitePageStore::in_memory().unwrap();
        let ids = store
            .insert_pages(&[new_page("ch-1", 1), new_page("ch-1", 2), new_page("ch-1", 3)])
            .await
            .unwrap();

        store.delete_pages(&ids[1..]).await.unwrap();
        store.delete_pages(&[9999]).await.unwrap();

        let pages = store.list_pages("ch-1").await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 1);
    }

    #[tokio::test]
    async fn test_locked_database_does_not_hold_the_caller() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("pages.db");
        let store = SqlitePageStore::new(&db_path)
            .unwrap()
            .with_busy_timeout(Duration::from_millis(500))
            .unwrap();

        let holder = Connection::open(&db_path).unwrap();
        holder.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let started = std::time::Instant::now();
        let result =
            tokio::time::timeout(Duration::from_millis(100), store.max_page_number("ch-1")).await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_millis(400));

        // Once the busy timeout runs out the statement itself fails.
        let err = store.insert_pages(&[new_page("ch-1", 1)]).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(ref msg) if msg.contains("locked")));

        holder.execute_batch("ROLLBACK").unwrap();
        store.insert_pages(&[new_page("ch-1", 1)]).await.unwrap();
        assert_eq!(store.max_page_number("ch-1").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("pages.db");

        {
            let store = SqlitePageStore::new(&db_path).unwrap();
            store.insert_pages(&[new_page("ch-1", 1)]).await.unwrap();
        }

        let store = SqlitePageStore::new(&db_path).unwrap();
        assert_eq!(store.max_page_number("ch-1").await.unwrap(), Some(1));
    }
}
