//! Catalog API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use manga_admin_core::{CatalogError, Chapter, Manga, NewChapter, NewManga};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct MangaListResponse {
    pub manga: Vec<Manga>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ChapterListResponse {
    pub chapters: Vec<Chapter>,
    pub total: usize,
}

/// Request body for creating a chapter; the manga comes from the path.
#[derive(Debug, Deserialize)]
pub struct CreateChapterBody {
    pub chapter_number: f64,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: CatalogError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CatalogError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn not_found(what: &str, id: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("{} not found: {}", what, id),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/manga
///
/// List all manga ordered by title.
pub async fn list_manga(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MangaListResponse>, impl IntoResponse> {
    match state.catalog().list_manga() {
        Ok(manga) => {
            let total = manga.len();
            Ok(Json(MangaListResponse { manga, total }))
        }
        Err(e) => Err(error_response(e)),
    }
}

/// POST /api/v1/manga
pub async fn create_manga(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewManga>,
) -> Result<(StatusCode, Json<Manga>), impl IntoResponse> {
    match state.catalog().create_manga(body) {
        Ok(manga) => {
            tracing::info!(manga_id = %manga.id, title = %manga.title, "Created manga");
            Ok((StatusCode::CREATED, Json(manga)))
        }
        Err(e) => Err(error_response(e)),
    }
}

/// GET /api/v1/manga/{id}
pub async fn get_manga(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Manga>, impl IntoResponse> {
    match state.catalog().get_manga(&id) {
        Ok(Some(manga)) => Ok(Json(manga)),
        Ok(None) => Err(not_found("Manga", &id)),
        Err(e) => Err(error_response(e)),
    }
}

/// GET /api/v1/manga/{id}/chapters
///
/// List a manga's chapters ordered by chapter number.
pub async fn list_chapters(
    State(state): State<Arc<AppState>>,
    Path(manga_id): Path<String>,
) -> Result<Json<ChapterListResponse>, impl IntoResponse> {
    let catalog = state.catalog();

    match catalog.get_manga(&manga_id) {
        Ok(Some(_)) => {}
        Ok(None) => return Err(not_found("Manga", &manga_id)),
        Err(e) => return Err(error_response(e)),
    }

    match catalog.list_chapters(&manga_id) {
        Ok(chapters) => {
            let total = chapters.len();
            Ok(Json(ChapterListResponse { chapters, total }))
        }
        Err(e) => Err(error_response(e)),
    }
}

/// POST /api/v1/manga/{id}/chapters
pub async fn create_chapter(
    State(state): State<Arc<AppState>>,
    Path(manga_id): Path<String>,
    Json(body): Json<CreateChapterBody>,
) -> Result<(StatusCode, Json<Chapter>), impl IntoResponse> {
    let request = NewChapter {
        manga_id,
        chapter_number: body.chapter_number,
        title: body.title,
    };

    match state.catalog().create_chapter(request) {
        Ok(chapter) => {
            tracing::info!(
                chapter_id = %chapter.id,
                manga_id = %chapter.manga_id,
                chapter_number = chapter.chapter_number,
                "Created chapter"
            );
            Ok((StatusCode::CREATED, Json(chapter)))
        }
        Err(e) => Err(error_response(e)),
    }
}

/// GET /api/v1/chapters/{id}
pub async fn get_chapter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Chapter>, impl IntoResponse> {
    match state.catalog().get_chapter(&id) {
        Ok(Some(chapter)) => Ok(Json(chapter)),
        Ok(None) => Err(not_found("Chapter", &id)),
        Err(e) => Err(error_response(e)),
    }
}
