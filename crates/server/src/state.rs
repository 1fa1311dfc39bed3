use std::sync::Arc;

use manga_admin_core::{AuditStore, CatalogStore, Config, PageStore, Sequencer};

/// Shared application state
pub struct AppState {
    config: Config,
    audit_store: Arc<dyn AuditStore>,
    catalog: Arc<dyn CatalogStore>,
    sequencer: Arc<Sequencer>,
}

impl AppState {
    pub fn new(
        config: Config,
        audit_store: Arc<dyn AuditStore>,
        catalog: Arc<dyn CatalogStore>,
        sequencer: Arc<Sequencer>,
    ) -> Self {
        Self {
            config,
            audit_store,
            catalog,
            sequencer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn catalog(&self) -> &dyn CatalogStore {
        self.catalog.as_ref()
    }

    /// The sequencer carries its own audit handle for upload events.
    pub fn sequencer(&self) -> &Arc<Sequencer> {
        &self.sequencer
    }

    pub fn page_store(&self) -> &dyn PageStore {
        self.sequencer.store().as_ref()
    }
}
