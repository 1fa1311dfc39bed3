pub mod audit;
pub mod catalog;
pub mod config;
pub mod metrics;
pub mod pages;
pub mod sequencer;
pub mod testing;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditEventEnvelope, AuditFilter, AuditHandle,
    AuditRecord, AuditStore, AuditWriter, SqliteAuditStore, WriterSummary,
};
pub use catalog::{
    CatalogError, CatalogStore, Chapter, Manga, NewChapter, NewManga, SqliteCatalog,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    ServerConfig,
};
pub use pages::{NewPage, Page, PageId, PageStore, SqlitePageStore, StoreError};
pub use sequencer::{
    ChapterTurns, ImageNaming, Sequencer, SequencerConfig, SequencerError, SequencerPhase,
    UploadBatch, UploadContext, UploadOutcome,
};
