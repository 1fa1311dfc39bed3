//! Chapter page API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use manga_admin_core::{
    Chapter, Page, SequencerError, UploadBatch, UploadContext, UploadOutcome,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::middleware::{RequestId, RequestedBy};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for uploading pages. File order is page order.
#[derive(Debug, Deserialize)]
pub struct UploadPagesBody {
    pub files: Vec<String>,
}

/// Response for listing pages
#[derive(Debug, Serialize)]
pub struct PageListResponse {
    pub chapter_id: String,
    pub pages: Vec<Page>,
    pub total: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct UploadErrorResponse {
    pub error: String,
    pub kind: String,
}

type Failure = (StatusCode, Json<UploadErrorResponse>);

fn failure(status: StatusCode, kind: &str, error: impl Into<String>) -> Failure {
    (
        status,
        Json(UploadErrorResponse {
            error: error.into(),
            kind: kind.to_string(),
        }),
    )
}

/// HTTP status for a failed upload.
pub fn status_for(err: &SequencerError) -> StatusCode {
    match err {
        SequencerError::EmptyBatch => StatusCode::BAD_REQUEST,
        SequencerError::BatchTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        SequencerError::PageNumberConflict { .. } | SequencerError::PageNumberOverflow { .. } => {
            StatusCode::CONFLICT
        }
        SequencerError::StoreUnavailable(_) | SequencerError::Cancelled => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        SequencerError::PartialFailureRecovered { .. } | SequencerError::CleanupFailed { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn require_chapter(state: &AppState, chapter_id: &str) -> Result<Chapter, Failure> {
    match state.catalog().get_chapter(chapter_id) {
        Ok(Some(chapter)) => Ok(chapter),
        Ok(None) => Err(failure(
            StatusCode::NOT_FOUND,
            "chapter_not_found",
            format!("Chapter not found: {}", chapter_id),
        )),
        Err(e) => Err(failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "catalog_error",
            e.to_string(),
        )),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/chapters/{id}/pages
///
/// Pages ordered by page number.
pub async fn list_pages(
    State(state): State<Arc<AppState>>,
    Path(chapter_id): Path<String>,
) -> Result<Json<PageListResponse>, Failure> {
    require_chapter(&state, &chapter_id)?;

    let pages = state
        .page_store()
        .list_pages(&chapter_id)
        .await
        .map_err(|e| failure(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", e.to_string()))?;

    let total = pages.len();
    Ok(Json(PageListResponse {
        chapter_id,
        pages,
        total,
    }))
}

/// POST /api/v1/chapters/{id}/pages
///
/// Append the submitted files as the chapter's next pages.
pub async fn upload_pages(
    State(state): State<Arc<AppState>>,
    Path(chapter_id): Path<String>,
    RequestedBy(requested_by): RequestedBy,
    RequestId(request_id): RequestId,
    Json(body): Json<UploadPagesBody>,
) -> Result<(StatusCode, Json<UploadOutcome>), Failure> {
    require_chapter(&state, &chapter_id)?;

    let ctx = UploadContext::new(requested_by).with_request_id(request_id);
    let batch = UploadBatch {
        chapter_id,
        files: body.files,
    };

    // Dropping this handler cancels the token; the spawned upload still
    // removes anything it wrote.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let sequencer = Arc::clone(state.sequencer());
    let upload = tokio::spawn(async move {
        sequencer
            .upload_batch_cancellable(&ctx, batch, &cancel)
            .await
    });

    match upload.await {
        Ok(Ok(outcome)) => Ok((StatusCode::CREATED, Json(outcome))),
        Ok(Err(err)) => Err(failure(status_for(&err), err.kind(), err.to_string())),
        Err(e) => Err(failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            format!("Upload task failed: {}", e),
        )),
    }
}
