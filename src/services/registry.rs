use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::models::job::JobId;

type Tasks = Arc<Mutex<HashMap<JobId, JoinHandle<()>>>>;

fn lock(tasks: &Tasks) -> MutexGuard<'_, HashMap<JobId, JoinHandle<()>>> {
    match tasks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Removes a job from the registry when its task ends, including by panic.
struct Deregister {
    tasks: Tasks,
    finished: Arc<Notify>,
    job_id: JobId,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        lock(&self.tasks).remove(&self.job_id);
        self.finished.notify_waiters();
    }
}

/// Background job tasks keyed by job id.
///
/// A job stays registered until its task has returned, so `in_flight` and
/// `is_running` stay accurate while the registry is being drained.
#[derive(Clone, Default)]
pub struct JobRegistry {
    tasks: Tasks,
    finished: Arc<Notify>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `work` for `job_id` and track it until it finishes.
    pub fn spawn<F>(&self, job_id: JobId, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let deregister = Deregister {
            tasks: self.tasks.clone(),
            finished: self.finished.clone(),
            job_id,
        };
        // Held across the spawn so the task cannot deregister before it is inserted.
        let mut tasks = lock(&self.tasks);

        let handle = tokio::spawn(async move {
            let _deregister = deregister;
            work.await;
        });

        tasks.insert(job_id, handle);
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.tasks).len()
    }

    pub fn is_running(&self, job_id: JobId) -> bool {
        lock(&self.tasks).contains_key(&job_id)
    }

    /// Wait for every tracked job, including ones registered while draining.
    pub async fn drain(&self) {
        loop {
            // Created before the check so a completion in between is not missed.
            let finished = self.finished.notified();

            let remaining = self.in_flight();
            if remaining == 0 {
                return;
            }

            tracing::info!(jobs = remaining, "Waiting for in-flight jobs");
            finished.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_finished_jobs_deregister() {
        let registry = JobRegistry::new();
        let (tx, rx) = oneshot::channel::<()>();
        registry.spawn(1, async move {
            let _ = rx.await;
        });
        assert!(registry.is_running(1));

        tx.send(()).unwrap();
        for _ in 0..50 {
            if !registry.is_running(1) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(registry.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_drain_waits_for_running_jobs() {
        let registry = JobRegistry::new();
        let (tx, rx) = oneshot::channel();
        registry.spawn(7, async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(());
        });

        registry.drain().await;
        assert!(rx.await.is_ok());
        assert_eq!(registry.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_jobs_stay_visible_while_draining() {
        let registry = JobRegistry::new();
        let (release, gate) = oneshot::channel::<()>();
        registry.spawn(3, async move {
            let _ = gate.await;
        });

        let draining = tokio::spawn({
            let registry = registry.clone();
            async move { registry.drain().await }
        });
        tokio::task::yield_now().await;

        assert!(registry.is_running(3));
        assert_eq!(registry.in_flight(), 1);
        assert!(!draining.is_finished());

        release.send(()).unwrap();
        draining.await.unwrap();
        assert!(!registry.is_running(3));
    }

    #[tokio::test]
    async fn test_panicking_job_still_deregisters() {
        let registry = JobRegistry::new();
        registry.spawn(9, async {
            panic!("job crashed");
        });

        tokio::time::timeout(Duration::from_secs(1), registry.drain())
            .await
            .expect("drain should not hang on a crashed job");
        assert_eq!(registry.in_flight(), 0);
    }
}
