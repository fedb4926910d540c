use std::sync::Arc;

use crate::db::PersistenceGateway;
use crate::services::analyzer::ImageAnalyzer;
use crate::services::orchestrator::JobOrchestrator;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn PersistenceGateway>,
    pub jobs: JobOrchestrator,
}

impl AppState {
    pub fn new(
        db: Arc<dyn PersistenceGateway>,
        analyzer: Arc<dyn ImageAnalyzer>,
        max_concurrent_visits: usize,
    ) -> Self {
        Self {
            jobs: JobOrchestrator::new(db.clone(), analyzer, max_concurrent_visits),
            db,
        }
    }
}
