//! SQLite-backed manga catalog implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{CatalogError, CatalogStore, Chapter, Manga, NewChapter, NewManga};

/// The catalog shares its database file with the page and audit stores.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed manga catalog.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Create a new SQLite catalog, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(|e| CatalogError::Database(e.to_string()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS manga (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                cover_ref TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_manga_title ON manga(title);

            CREATE TABLE IF NOT EXISTS chapters (
                id TEXT PRIMARY KEY,
                manga_id TEXT NOT NULL REFERENCES manga(id) ON DELETE CASCADE,
                chapter_number REAL NOT NULL,
                title TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chapters_manga_id ON chapters(manga_id);
            "#,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Database("catalog lock poisoned".to_string()))
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_manga(row: &rusqlite::Row) -> rusqlite::Result<Manga> {
        let created_at_str: String = row.get(4)?;
        Ok(Manga {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            cover_ref: row.get(3)?,
            created_at: Self::parse_timestamp(&created_at_str),
        })
    }

    fn row_to_chapter(row: &rusqlite::Row) -> rusqlite::Result<Chapter> {
        let created_at_str: String = row.get(4)?;
        Ok(Chapter {
            id: row.get(0)?,
            manga_id: row.get(1)?,
            chapter_number: row.get(2)?,
            title: row.get(3)?,
            created_at: Self::parse_timestamp(&created_at_str),
        })
    }

    fn manga_exists(conn: &Connection, id: &str) -> Result<bool, CatalogError> {
        conn.query_row("SELECT 1 FROM manga WHERE id = ?", params![id], |_| Ok(()))
            .optional()
            .map(|found| found.is_some())
            .map_err(|e| CatalogError::Database(e.to_string()))
    }
}

impl CatalogStore for SqliteCatalog {
    fn create_manga(&self, request: NewManga) -> Result<Manga, CatalogError> {
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(CatalogError::InvalidInput("title cannot be empty".to_string()));
        }

        let conn = self.conn()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO manga (id, title, description, cover_ref, created_at) VALUES (?, ?, ?, ?, ?)",
            params![id, title, request.description, request.cover_ref, now.to_rfc3339()],
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(Manga {
            id,
            title,
            description: request.description,
            cover_ref: request.cover_ref,
            created_at: now,
        })
    }

    fn list_manga(&self) -> Result<Vec<Manga>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title, description, cover_ref, created_at FROM manga ORDER BY title ASC",
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_manga)
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let mut manga = Vec::new();
        for row in rows {
            manga.push(row.map_err(|e| CatalogError::Database(e.to_string()))?);
        }
        Ok(manga)
    }

    fn get_manga(&self, id: &str) -> Result<Option<Manga>, CatalogError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, title, description, cover_ref, created_at FROM manga WHERE id = ?",
            params![id],
            Self::row_to_manga,
        )
        .optional()
        .map_err(|e| CatalogError::Database(e.to_string()))
    }

    fn create_chapter(&self, request: NewChapter) -> Result<Chapter, CatalogError> {
        if !request.chapter_number.is_finite() || request.chapter_number < 0.0 {
            return Err(CatalogError::InvalidInput(format!(
                "invalid chapter number: {}",
                request.chapter_number
            )));
        }

        let conn = self.conn()?;
        if !Self::manga_exists(&conn, &request.manga_id)? {
            return Err(CatalogError::NotFound(format!("manga {}", request.manga_id)));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO chapters (id, manga_id, chapter_number, title, created_at) VALUES (?, ?, ?, ?, ?)",
            params![
                id,
                request.manga_id,
                request.chapter_number,
                request.title,
                now.to_rfc3339()
            ],
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(Chapter {
            id,
            manga_id: request.manga_id,
            chapter_number: request.chapter_number,
            title: request.title,
            created_at: now,
        })
    }

    fn list_chapters(&self, manga_id: &str) -> Result<Vec<Chapter>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, manga_id, chapter_number, title, created_at
                 FROM chapters WHERE manga_id = ? ORDER BY chapter_number ASC",
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![manga_id], Self::row_to_chapter)
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let mut chapters = Vec::new();
        for row in rows {
            chapters.push(row.map_err(|e| CatalogError::Database(e.to_string()))?);
        }
        Ok(chapters)
    }

    fn get_chapter(&self, id: &str) -> Result<Option<Chapter>, CatalogError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, manga_id, chapter_number, title, created_at FROM chapters WHERE id = ?",
            params![id],
            Self::row_to_chapter,
        )
        .optional()
        .map_err(|e| CatalogError::Database(e.to_string()))
    }
}
