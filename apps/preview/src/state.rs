use std::sync::Arc;

use crate::config::Config;
use crate::preview::PreviewStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Per-document preview passes and committed page state.
    pub preview: Arc<PreviewStore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let preview = Arc::new(PreviewStore::new(config.settle_delay));
        Self { config, preview }
    }
}
