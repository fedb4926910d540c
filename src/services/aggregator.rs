use std::sync::Arc;
use tokio::sync::Mutex;

use crate::db::PersistenceGateway;
use crate::error::JobResult;
use crate::models::job::{JobId, JobStatus, SubTaskFailure};

struct Verdict {
    status: JobStatus,
    finalized: bool,
}

/// Folds per-visit outcomes of one job into a single terminal status.
///
/// The verdict starts as `Completed` and can only move to `Failed`. A failure
/// is written to persistence while the verdict lock is held, so the stored
/// failure list never disagrees with the flag.
pub struct StatusAggregator {
    job_id: JobId,
    gateway: Arc<dyn PersistenceGateway>,
    verdict: Mutex<Verdict>,
}

impl StatusAggregator {
    pub fn new(job_id: JobId, gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            job_id,
            gateway,
            verdict: Mutex::new(Verdict {
                status: JobStatus::Completed,
                finalized: false,
            }),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub async fn report(&self, outcome: Result<(), SubTaskFailure>) {
        if let Err(failure) = outcome {
            self.record_failure(failure).await;
        }
    }

    pub async fn record_failure(&self, failure: SubTaskFailure) {
        let mut verdict = self.verdict.lock().await;
        if verdict.finalized {
            tracing::warn!(
                job_id = self.job_id,
                store_id = %failure.store_id,
                "Ignoring visit failure reported after the job was finalized"
            );
            return;
        }

        verdict.status = JobStatus::Failed;
        metrics::counter!("visits_failed_total").increment(1);
        tracing::warn!(
            job_id = self.job_id,
            store_id = %failure.store_id,
            error = %failure.error,
            "Visit failed"
        );

        if let Err(e) = self.gateway.record_failure(self.job_id, &failure).await {
            tracing::error!(
                job_id = self.job_id,
                store_id = %failure.store_id,
                error = %e,
                "Failed to record visit failure"
            );
        }
    }

    pub async fn status(&self) -> JobStatus {
        self.verdict.lock().await.status
    }

    /// Persist the terminal status. Only the first call writes; later calls
    /// return the already-finalized status.
    pub async fn finish(&self) -> JobResult<JobStatus> {
        let mut verdict = self.verdict.lock().await;
        if verdict.finalized {
            return Ok(verdict.status);
        }

        self.gateway
            .update_job_status(self.job_id, verdict.status)
            .await?;
        verdict.finalized = true;

        Ok(verdict.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryGateway;

    async fn aggregator() -> (Arc<MemoryGateway>, StatusAggregator) {
        let gateway = Arc::new(MemoryGateway::new());
        let job = gateway.create_job().await.unwrap();
        let aggregator = StatusAggregator::new(job.id, gateway.clone());
        (gateway, aggregator)
    }

    #[tokio::test]
    async fn test_all_ok_completes() {
        let (gateway, aggregator) = aggregator().await;
        aggregator.report(Ok(())).await;
        aggregator.report(Ok(())).await;

        assert_eq!(aggregator.finish().await.unwrap(), JobStatus::Completed);
        let job = gateway.get_job(aggregator.job_id()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(gateway.list_failures(job.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_sticky() {
        let (gateway, aggregator) = aggregator().await;
        aggregator
            .report(Err(SubTaskFailure::new("S1", "store not found")))
            .await;
        aggregator.report(Ok(())).await;
        aggregator.report(Ok(())).await;

        assert_eq!(aggregator.status().await, JobStatus::Failed);
        assert_eq!(aggregator.finish().await.unwrap(), JobStatus::Failed);

        let failures = gateway.list_failures(aggregator.job_id()).await.unwrap();
        assert_eq!(failures, vec![SubTaskFailure::new("S1", "store not found")]);
    }

    #[tokio::test]
    async fn test_finish_writes_once() {
        let (gateway, aggregator) = aggregator().await;
        assert_eq!(aggregator.finish().await.unwrap(), JobStatus::Completed);

        aggregator
            .record_failure(SubTaskFailure::new("late", "too late"))
            .await;

        assert_eq!(aggregator.finish().await.unwrap(), JobStatus::Completed);
        assert!(gateway
            .list_failures(aggregator.job_id())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_all_recorded() {
        let (gateway, aggregator) = aggregator().await;
        let aggregator = Arc::new(aggregator);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let aggregator = aggregator.clone();
                tokio::spawn(async move {
                    let outcome = if i % 2 == 0 {
                        Err(SubTaskFailure::new(format!("S{i}"), "boom"))
                    } else {
                        Ok(())
                    };
                    aggregator.report(outcome).await;
                })
            })
            .collect();
        for joined in futures::future::join_all(handles).await {
            joined.unwrap();
        }

        assert_eq!(aggregator.finish().await.unwrap(), JobStatus::Failed);
        assert_eq!(
            gateway.list_failures(aggregator.job_id()).await.unwrap().len(),
            8
        );
    }
}
