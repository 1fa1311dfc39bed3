use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use manga_admin_core::{AuditError, AuditFilter, AuditRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// Maximum allowed limit for audit queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for audit queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for audit endpoint
#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    /// Filter by chapter ID
    pub chapter_id: Option<String>,
    /// Filter by the request that caused the event
    pub request_id: Option<String>,
    /// Filter by event type
    pub event_type: Option<String>,
    /// Filter by user ID
    pub user_id: Option<String>,
    /// Filter events after this timestamp (ISO 8601)
    pub from: Option<DateTime<Utc>>,
    /// Filter events before this timestamp (ISO 8601)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of events to return (default 100, max 1000)
    pub limit: Option<i64>,
    /// Pagination offset (default 0)
    pub offset: Option<i64>,
}

/// Response for audit query endpoint
#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    /// List of audit events
    pub events: Vec<AuditRecord>,
    /// Total number of matching events
    pub total: i64,
    /// Limit used for this query
    pub limit: i64,
    /// Offset used for this query
    pub offset: i64,
}

/// Error response for audit queries
#[derive(Debug, Serialize)]
pub struct AuditErrorResponse {
    pub error: String,
}

fn store_failure(action: &str, err: AuditError) -> (StatusCode, Json<AuditErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(AuditErrorResponse {
            error: format!("Failed to {} audit events: {}", action, err),
        }),
    )
}

impl AuditQueryParams {
    /// Filter without pagination, used for the total count.
    fn filter(&self) -> AuditFilter {
        let mut filter = AuditFilter::new().with_time_range(self.from, self.to);
        if let Some(ref chapter_id) = self.chapter_id {
            filter = filter.with_chapter_id(chapter_id);
        }
        if let Some(ref request_id) = self.request_id {
            filter = filter.with_request_id(request_id);
        }
        if let Some(ref event_type) = self.event_type {
            filter = filter.with_event_type(event_type);
        }
        if let Some(ref user_id) = self.user_id {
            filter = filter.with_user_id(user_id);
        }
        filter
    }
}

/// GET /api/v1/audit
///
/// Newest events first.
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditQueryResponse>, (StatusCode, Json<AuditErrorResponse>)> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let count_filter = params.filter();
    let page_filter = count_filter.clone().with_limit(limit).with_offset(offset);

    let store = state.audit_store();
    let events = store
        .query(&page_filter)
        .map_err(|e| store_failure("query", e))?;
    let total = store
        .count(&count_filter)
        .map_err(|e| store_failure("count", e))?;

    Ok(Json(AuditQueryResponse {
        events,
        total,
        limit,
        offset,
    }))
}
