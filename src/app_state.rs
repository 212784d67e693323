//! Implements a struct that holds the state of the REST server.

use std::sync::Arc;

use crate::{DashboardConfig, PanelStore, RefreshController, upstream::RecordSource};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The validated server configuration.
    pub config: Arc<DashboardConfig>,

    /// The latest records for each panel.
    pub store: PanelStore,

    /// The controller that polls upstream and writes to `store`.
    pub controller: Arc<RefreshController>,
}

impl AppState {
    /// Create a new [AppState] that fetches panel records from `source`.
    ///
    /// The refresh controller is created but not started, call
    /// [RefreshController::start] to begin polling.
    pub fn new(config: DashboardConfig, source: Arc<dyn RecordSource>) -> Self {
        let store = PanelStore::new();
        let controller = RefreshController::new(source, store.clone(), config.refresh_interval);

        Self {
            config: Arc::new(config),
            store,
            controller: Arc::new(controller),
        }
    }
}
