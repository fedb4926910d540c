use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod health;
pub mod jobs;
pub mod metrics;

/// Job and health endpoints, without transport layers or the metrics scrape.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/submit/", post(jobs::submit_job))
        .route("/api/status", get(jobs::get_job_status))
        .with_state(state)
}
