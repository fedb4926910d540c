use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::JobError;
use crate::models::job::{JobStatusView, SubmitResponse};
use crate::models::visit::SubmitJobRequest;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub jobid: Option<String>,
}

/// POST /api/submit/ — validate a batch of visits and start processing it.
///
/// The body is parsed as JSON whatever `Content-Type` the client sends.
pub async fn submit_job(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SubmitResponse>), JobError> {
    let request: SubmitJobRequest = serde_json::from_slice(&body)
        .map_err(|e| JobError::Validation(format!("invalid request body: {e}")))?;

    let job_id = state.jobs.submit(request).await.inspect_err(|e| {
        tracing::info!(error = %e, "Submission rejected");
    })?;

    Ok((StatusCode::CREATED, Json(SubmitResponse { job_id })))
}

/// GET /api/status?jobid= — current state of a job.
pub async fn get_job_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<JobStatusView>, JobError> {
    let raw = query.jobid.unwrap_or_default();
    let job_id = state
        .jobs
        .validate_job_id(&raw)
        .await?
        .ok_or_else(|| JobError::NotFound(format!("invalid jobid: {raw:?}")))?;

    Ok(Json(state.jobs.get_status(job_id).await?))
}
