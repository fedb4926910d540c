use axum::extract::State;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the global Prometheus recorder and describe the pipeline metrics.
pub fn install_recorder() -> Result<Arc<PrometheusHandle>, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!("jobs_submitted_total", "Jobs accepted for processing");
    metrics::describe_counter!("jobs_rejected_total", "Submissions that failed validation");
    metrics::describe_counter!("jobs_completed_total", "Jobs whose visits all succeeded");
    metrics::describe_counter!("jobs_failed_total", "Jobs with at least one failed visit");
    metrics::describe_counter!("visits_failed_total", "Visits that stopped at an error");
    metrics::describe_counter!("images_analyzed_total", "Images analyzed and stored");
    metrics::describe_gauge!("jobs_in_flight", "Jobs still being processed");
    metrics::describe_histogram!(
        "job_processing_seconds",
        "Time from dispatch to terminal status"
    );

    Ok(Arc::new(handle))
}

/// GET /metrics — Prometheus text exposition.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> String {
    handle.render()
}
