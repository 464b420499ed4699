use std::sync::Arc;

use crate::analysis::client::AnalysisClient;
use crate::analysis::store::AnalysisStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Stateless; clones share the same upstream backend.
    pub analyzer: AnalysisClient,
    /// Pluggable persistence. Default: PgAnalysisStore.
    pub store: Arc<dyn AnalysisStore>,
}
