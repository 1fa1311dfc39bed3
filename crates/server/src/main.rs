use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manga_admin_core::{
    create_audit_system, load_config, validate_config, AuditEvent, AuditStore, CatalogStore,
    PageStore, Sequencer, SqliteAuditStore, SqliteCatalog, SqlitePageStore,
};
use manga_admin_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("MANGA_ADMIN_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!(
        store_timeout_ms = config.sequencer.store_timeout_ms,
        max_conflict_retries = config.sequencer.max_conflict_retries,
        chapter_turns = ?config.sequencer.chapter_turns,
        "Sequencer settings"
    );

    // Compute config hash for audit
    let config_json = serde_json::to_string(&config).context("Failed to serialize config")?;
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to create audit store")?,
    );
    info!("Audit store initialized");

    let catalog: Arc<dyn CatalogStore> = Arc::new(
        SqliteCatalog::new(&config.database.path).context("Failed to create catalog")?,
    );
    info!("Catalog initialized");

    // Lock waits end with the caller's store timeout instead of outliving it.
    let page_store: Arc<dyn PageStore> = Arc::new(
        SqlitePageStore::new(&config.database.path)
            .and_then(|store| store.with_busy_timeout(config.sequencer.store_timeout()))
            .context("Failed to create page store")?,
    );
    info!(
        "Page store initialized ({}, atomic batches: {})",
        page_store.name(),
        page_store.atomic_batches()
    );

    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);
    let writer_handle = tokio::spawn(audit_writer.run());

    audit_handle
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;
    info!("Emitted ServiceStarted audit event");

    let sequencer = Arc::new(
        Sequencer::new(page_store, config.sequencer.clone()).with_audit(audit_handle.clone()),
    );

    let state = Arc::new(AppState::new(
        config.clone(),
        audit_store,
        catalog,
        sequencer,
    ));

    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    audit_handle
        .emit(AuditEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // The router (and the sequencer's handle clone) is gone once serve
    // returns; dropping the last handle closes the writer's channel.
    drop(audit_handle);

    match writer_handle.await {
        Ok(summary) => info!(
            written = summary.written,
            failed = summary.failed,
            "Audit writer stopped"
        ),
        Err(e) => error!("Audit writer task failed: {}", e),
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
