//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::PortalConfig;
use crate::db::{DirectoryStore, ProgramStore};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Handlers build services from the store
/// trait objects, so the same router runs against `PostgreSQL` in
/// production and the in-memory store in tests.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: PortalConfig,
    directory: Arc<dyn DirectoryStore>,
    program: Arc<dyn ProgramStore>,
}

impl AppState {
    /// Create state over a store that implements both traits.
    ///
    /// # Arguments
    ///
    /// * `config` - Portal configuration
    /// * `store` - Backend shared by the directory and program views
    #[must_use]
    pub fn new<S>(config: PortalConfig, store: Arc<S>) -> Self
    where
        S: DirectoryStore + ProgramStore + 'static,
    {
        let directory: Arc<dyn DirectoryStore> = store.clone();
        let program: Arc<dyn ProgramStore> = store;
        Self {
            inner: Arc::new(AppStateInner {
                config,
                directory,
                program,
            }),
        }
    }

    /// Get a reference to the portal configuration.
    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.inner.config
    }

    /// Users, zones and the bootstrap flag.
    #[must_use]
    pub fn directory(&self) -> &dyn DirectoryStore {
        self.inner.directory.as_ref()
    }

    /// Tasks and submissions.
    #[must_use]
    pub fn program(&self) -> &dyn ProgramStore {
        self.inner.program.as_ref()
    }
}
