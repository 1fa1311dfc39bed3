//! Types for the manga catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A manga series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manga {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Cover image locator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A chapter of a manga series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub manga_id: String,
    /// Ordinal assigned by the catalog editors (e.g. 12.5 for an extra).
    pub chapter_number: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request to create a manga.
#[derive(Debug, Clone, Deserialize)]
pub struct NewManga {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cover_ref: Option<String>,
}

impl NewManga {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            cover_ref: None,
        }
    }
}

/// Request to create a chapter.
#[derive(Debug, Clone, Deserialize)]
pub struct NewChapter {
    pub manga_id: String,
    pub chapter_number: f64,
    #[serde(default)]
    pub title: Option<String>,
}

impl NewChapter {
    pub fn new(manga_id: impl Into<String>, chapter_number: f64) -> Self {
        Self {
            manga_id: manga_id.into(),
            chapter_number,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
