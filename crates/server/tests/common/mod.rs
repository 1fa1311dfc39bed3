//! Common test utilities for API testing.
//!
//! Builds an in-process router over SQLite stores in a temp directory, so
//! tests exercise the real sequencer, catalog and audit trail.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use manga_admin_core::{
    create_audit_system, AuditFilter, AuditRecord, AuditStore, CatalogStore, Config,
    DatabaseConfig, PageStore, Sequencer, SequencerConfig, SqliteAuditStore, SqliteCatalog,
    SqlitePageStore,
};
use manga_admin_server::{api::create_router, state::AppState};

/// Test fixture wrapping the API router and its stores.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Page store shared with the sequencer
    pub page_store: Arc<SqlitePageStore>,
    /// Audit store for asserting recorded events
    pub audit_store: Arc<SqliteAuditStore>,
    /// Temporary directory holding the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture with default sequencer settings.
    pub async fn new() -> Self {
        Self::with_sequencer(SequencerConfig::default()).await
    }

    /// Create a fixture with custom sequencer settings.
    pub async fn with_sequencer(sequencer: SequencerConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            sequencer: sequencer.clone(),
            ..Default::default()
        };

        let audit_store =
            Arc::new(SqliteAuditStore::new(&db_path).expect("Failed to create audit store"));
        let catalog = Arc::new(SqliteCatalog::new(&db_path).expect("Failed to create catalog"));
        let page_store =
            Arc::new(SqlitePageStore::new(&db_path).expect("Failed to create page store"));

        let (audit_handle, audit_writer) =
            create_audit_system(Arc::clone(&audit_store) as Arc<dyn AuditStore>, 100);
        tokio::spawn(audit_writer.run());

        let sequencer = Arc::new(
            Sequencer::new(Arc::clone(&page_store) as Arc<dyn PageStore>, sequencer)
                .with_audit(audit_handle),
        );

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&audit_store) as Arc<dyn AuditStore>,
            catalog as Arc<dyn CatalogStore>,
            sequencer,
        ));

        Self {
            router: create_router(state),
            page_store,
            audit_store,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), &[]).await
    }

    /// Send a POST request on behalf of a staff member.
    pub async fn post_as(&self, user: &str, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), &[("X-Requested-By", user)])
            .await
    }

    /// Send a POST request with extra headers.
    pub async fn post_with_headers(
        &self,
        path: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        self.request("POST", path, Some(body), headers).await
    }

    /// Send a GET request and return the raw text body.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&body_bytes).into_owned())
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// Create a manga and one chapter, returning the chapter id.
    pub async fn create_chapter(&self, title: &str, chapter_number: f64) -> String {
        let manga = self.post("/api/v1/manga", json!({ "title": title })).await;
        assert_eq!(manga.status, StatusCode::CREATED, "{}", manga.body);
        let manga_id = manga.body["id"].as_str().unwrap().to_string();

        let chapter = self
            .post(
                &format!("/api/v1/manga/{}/chapters", manga_id),
                json!({ "chapter_number": chapter_number }),
            )
            .await;
        assert_eq!(chapter.status, StatusCode::CREATED, "{}", chapter.body);
        chapter.body["id"].as_str().unwrap().to_string()
    }

    /// Upload `count` generated file names to a chapter.
    pub async fn upload(&self, chapter_id: &str, prefix: &str, count: usize) -> TestResponse {
        let files: Vec<String> = (1..=count)
            .map(|i| format!("{}-{:03}.png", prefix, i))
            .collect();
        self.post(
            &format!("/api/v1/chapters/{}/pages", chapter_id),
            json!({ "files": files }),
        )
        .await
    }

    /// Poll the audit store until `min` events match, since the writer is
    /// asynchronous.
    pub async fn wait_for_audit(&self, filter: AuditFilter, min: i64) -> Vec<AuditRecord> {
        for _ in 0..50 {
            if self.audit_store.count(&filter).unwrap_or(0) >= min {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.audit_store.query(&filter).expect("audit query failed")
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
