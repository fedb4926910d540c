use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::db::gateway::PersistenceGateway;
use crate::error::{JobError, JobResult};
use crate::models::job::{Job, JobId, JobStatus, SubTaskFailure};
use crate::models::store::{ImageResult, Store};

#[derive(Default)]
struct Tables {
    next_job_id: JobId,
    stores: HashMap<String, Store>,
    jobs: HashMap<JobId, Job>,
    failures: Vec<(JobId, SubTaskFailure)>,
    images: Vec<ImageResult>,
    rejected_image_urls: HashSet<String>,
    lookups_unavailable: bool,
}

/// In-process gateway for local runs and tests. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryGateway {
    tables: Mutex<Tables>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stores(stores: impl IntoIterator<Item = Store>) -> Self {
        let gateway = Self::new();
        for store in stores {
            gateway.insert_store(store);
        }
        gateway
    }

    fn lock(&self) -> JobResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| JobError::Persistence("memory store lock poisoned".to_string()))
    }

    /// Lock for a read of stores or jobs, honoring `set_lookups_unavailable`.
    fn lookup(&self) -> JobResult<MutexGuard<'_, Tables>> {
        let tables = self.lock()?;
        if tables.lookups_unavailable {
            return Err(JobError::Persistence("lookup unavailable".to_string()));
        }
        Ok(tables)
    }

    /// Make store and job reads fail, as an unreachable database would.
    pub fn set_lookups_unavailable(&self, unavailable: bool) {
        if let Ok(mut tables) = self.lock() {
            tables.lookups_unavailable = unavailable;
        }
    }

    pub fn insert_store(&self, store: Store) {
        if let Ok(mut tables) = self.lock() {
            tables.stores.insert(store.store_id.clone(), store);
        }
    }

    pub fn remove_store(&self, store_id: &str) {
        if let Ok(mut tables) = self.lock() {
            tables.stores.remove(store_id);
        }
    }

    /// Make `store_image_result` fail for the given image URL.
    pub fn reject_image_writes_for(&self, image_url: &str) {
        if let Ok(mut tables) = self.lock() {
            tables.rejected_image_urls.insert(image_url.to_string());
        }
    }

    pub fn job_count(&self) -> usize {
        self.lock().map(|t| t.jobs.len()).unwrap_or_default()
    }

    pub fn image_results(&self, job_id: JobId) -> Vec<ImageResult> {
        self.lock()
            .map(|t| {
                t.images
                    .iter()
                    .filter(|r| r.job_id == job_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn store_exists(&self, store_id: &str) -> JobResult<bool> {
        Ok(self.lookup()?.stores.contains_key(store_id))
    }

    async fn find_store(&self, store_id: &str) -> JobResult<Option<Store>> {
        Ok(self.lookup()?.stores.get(store_id).cloned())
    }

    async fn create_job(&self) -> JobResult<Job> {
        let mut tables = self.lock()?;
        tables.next_job_id += 1;
        let now = Utc::now();
        let job = Job {
            id: tables.next_job_id,
            status: JobStatus::Ongoing,
            created_at: now,
            updated_at: now,
        };
        tables.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, job_id: JobId) -> JobResult<Option<Job>> {
        Ok(self.lookup()?.jobs.get(&job_id).cloned())
    }

    async fn job_exists(&self, job_id: JobId) -> JobResult<bool> {
        Ok(self.lookup()?.jobs.contains_key(&job_id))
    }

    async fn update_job_status(&self, job_id: JobId, status: JobStatus) -> JobResult<()> {
        let mut tables = self.lock()?;
        if let Some(job) = tables.jobs.get_mut(&job_id) {
            job.status = status;
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_failure(&self, job_id: JobId, failure: &SubTaskFailure) -> JobResult<()> {
        self.lock()?.failures.push((job_id, failure.clone()));
        Ok(())
    }

    async fn list_failures(&self, job_id: JobId) -> JobResult<Vec<SubTaskFailure>> {
        Ok(self
            .lookup()?
            .failures
            .iter()
            .filter(|(id, _)| *id == job_id)
            .map(|(_, failure)| failure.clone())
            .collect())
    }

    async fn store_image_result(&self, result: &ImageResult) -> JobResult<()> {
        let mut tables = self.lock()?;
        if tables.rejected_image_urls.contains(&result.image_url) {
            return Err(JobError::Persistence(format!(
                "failed to store image result for {}",
                result.image_url
            )));
        }
        tables.images.push(result.clone());
        Ok(())
    }

    async fn ping(&self) -> JobResult<()> {
        self.lock().map(|_| ())
    }
}
