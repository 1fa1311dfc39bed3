use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{audit, catalog, handlers, uploads};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        // Audit
        .route("/audit", get(audit::query_audit))
        // Catalog
        .route(
            "/manga",
            get(catalog::list_manga).post(catalog::create_manga),
        )
        .route("/manga/{id}", get(catalog::get_manga))
        .route(
            "/manga/{id}/chapters",
            get(catalog::list_chapters).post(catalog::create_chapter),
        )
        .route("/chapters/{id}", get(catalog::get_chapter))
        // Pages
        .route(
            "/chapters/{id}/pages",
            get(uploads::list_pages).post(uploads::upload_pages),
        )
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
