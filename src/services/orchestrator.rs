//! Job submission, background fan-out and status queries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::db::PersistenceGateway;
use crate::error::{JobError, JobResult};
use crate::models::job::{JobId, JobState, JobStatus, JobStatusView, SubTaskFailure};
use crate::models::visit::{SubmitJobRequest, Visit};
use crate::services::aggregator::StatusAggregator;
use crate::services::analyzer::ImageAnalyzer;
use crate::services::registry::JobRegistry;
use crate::services::visit::VisitProcessor;

pub const VISIT_ABORTED: &str = "visit processing aborted";

/// Entry point for the job pipeline.
///
/// Cloning is cheap; clones share the registry and the visit concurrency gate.
#[derive(Clone)]
pub struct JobOrchestrator {
    gateway: Arc<dyn PersistenceGateway>,
    processor: VisitProcessor,
    visit_gate: Arc<Semaphore>,
    registry: JobRegistry,
}

impl JobOrchestrator {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        analyzer: Arc<dyn ImageAnalyzer>,
        max_concurrent_visits: usize,
    ) -> Self {
        Self {
            processor: VisitProcessor::new(gateway.clone(), analyzer),
            gateway,
            visit_gate: Arc::new(Semaphore::new(max_concurrent_visits.max(1))),
            registry: JobRegistry::new(),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Validate a submission, register the job and start processing it in the
    /// background. Returns as soon as the job is registered.
    pub async fn submit(&self, request: SubmitJobRequest) -> JobResult<JobId> {
        if let Err(e) = self.validate(&request).await {
            metrics::counter!("jobs_rejected_total").increment(1);
            return Err(e);
        }

        let job = self.gateway.create_job().await?;
        metrics::counter!("jobs_submitted_total").increment(1);
        tracing::info!(job_id = job.id, visits = request.visits.len(), "Job registered");

        self.dispatch(job.id, request.visits);
        Ok(job.id)
    }

    /// Checks run in visit order and stop at the first violation.
    async fn validate(&self, request: &SubmitJobRequest) -> JobResult<()> {
        if request.count != request.visits.len() {
            return Err(JobError::Validation(format!(
                "count mismatch: expected {} visits, but got {}",
                request.count,
                request.visits.len()
            )));
        }

        for visit in &request.visits {
            if visit.store_id.is_empty() {
                return Err(JobError::Validation(
                    "missing store_id for visit".to_string(),
                ));
            }
            if !self.gateway.store_exists(&visit.store_id).await? {
                return Err(JobError::Validation(format!(
                    "invalid store_id: {}, store does not exist",
                    visit.store_id
                )));
            }
            if visit.image_urls.is_empty() {
                return Err(JobError::Validation(format!(
                    "missing image_url for store {}",
                    visit.store_id
                )));
            }
        }

        Ok(())
    }

    fn dispatch(&self, job_id: JobId, visits: Vec<Visit>) {
        let aggregator = Arc::new(StatusAggregator::new(job_id, self.gateway.clone()));
        let processor = self.processor.clone();
        let gate = self.visit_gate.clone();

        self.registry
            .spawn(job_id, run_job(aggregator, processor, gate, visits));
    }

    pub async fn get_status(&self, job_id: JobId) -> JobResult<JobStatusView> {
        let job = self
            .gateway
            .get_job(job_id)
            .await?
            .ok_or_else(|| JobError::NotFound(format!("job {job_id} not found")))?;

        let state = match job.status {
            JobStatus::Ongoing => JobState::Ongoing,
            JobStatus::Completed => JobState::Completed,
            JobStatus::Failed => JobState::Failed {
                error: self.gateway.list_failures(job_id).await?,
            },
        };

        Ok(JobStatusView { state, job_id })
    }

    /// Resolve a raw job id to an existing job.
    ///
    /// `Ok(None)` means the id is absent, malformed or unknown; `Err` is
    /// reserved for persistence failures.
    pub async fn validate_job_id(&self, raw: &str) -> JobResult<Option<JobId>> {
        let Ok(job_id) = raw.trim().parse::<JobId>() else {
            return Ok(None);
        };
        if job_id <= 0 {
            return Ok(None);
        }

        Ok(self
            .gateway
            .job_exists(job_id)
            .await?
            .then_some(job_id))
    }

    /// Wait for every in-flight job to reach a terminal status.
    pub async fn drain(&self) {
        self.registry.drain().await;
    }
}

/// Fan out one task per visit, wait for all of them, then write the verdict.
async fn run_job(
    aggregator: Arc<StatusAggregator>,
    processor: VisitProcessor,
    gate: Arc<Semaphore>,
    visits: Vec<Visit>,
) {
    let job_id = aggregator.job_id();
    let started = Instant::now();
    metrics::gauge!("jobs_in_flight").increment(1.0);

    let mut tasks = JoinSet::new();
    let mut stores = HashMap::new();

    for visit in visits {
        let store_id = visit.store_id.clone();
        let aggregator = aggregator.clone();
        let processor = processor.clone();
        let gate = gate.clone();

        let handle = tasks.spawn(async move {
            let _permit = gate.acquire_owned().await.ok();
            let outcome = processor.process(&visit, job_id).await;
            aggregator.report(outcome).await;
        });
        stores.insert(handle.id(), store_id);
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            let store_id = stores.remove(&e.id()).unwrap_or_default();
            tracing::error!(job_id, store_id = %store_id, error = %e, "Visit task aborted");
            aggregator
                .record_failure(SubTaskFailure::new(store_id, VISIT_ABORTED))
                .await;
        }
    }

    metrics::gauge!("jobs_in_flight").decrement(1.0);
    metrics::histogram!("job_processing_seconds").record(started.elapsed().as_secs_f64());

    match aggregator.finish().await {
        Ok(JobStatus::Failed) => {
            metrics::counter!("jobs_failed_total").increment(1);
            tracing::info!(
                job_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job failed"
            );
        }
        Ok(status) => {
            metrics::counter!("jobs_completed_total").increment(1);
            tracing::info!(
                job_id,
                status = %status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job completed"
            );
        }
        Err(e) => {
            tracing::error!(job_id, error = %e, "Failed to persist final job status");
        }
    }
}
