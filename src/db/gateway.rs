//! Persistence port for the job pipeline.
//!
//! The orchestrator and visit processors only talk to storage through
//! [`PersistenceGateway`]; each receives a shared handle at construction.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::queries;
use crate::error::JobResult;
use crate::models::job::{Job, JobId, JobStatus, SubTaskFailure};
use crate::models::store::{ImageResult, Store};

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn store_exists(&self, store_id: &str) -> JobResult<bool>;

    async fn find_store(&self, store_id: &str) -> JobResult<Option<Store>>;

    /// Register a new job in the `ongoing` state and return it with its fresh id.
    async fn create_job(&self) -> JobResult<Job>;

    async fn get_job(&self, job_id: JobId) -> JobResult<Option<Job>>;

    async fn job_exists(&self, job_id: JobId) -> JobResult<bool>;

    async fn update_job_status(&self, job_id: JobId, status: JobStatus) -> JobResult<()>;

    async fn record_failure(&self, job_id: JobId, failure: &SubTaskFailure) -> JobResult<()>;

    /// Failures for a job in the order they were recorded.
    async fn list_failures(&self, job_id: JobId) -> JobResult<Vec<SubTaskFailure>>;

    async fn store_image_result(&self, result: &ImageResult) -> JobResult<()>;

    /// Connectivity check used by `/health`.
    async fn ping(&self) -> JobResult<()>;
}

/// PostgreSQL-backed gateway.
#[derive(Clone)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PersistenceGateway for PgGateway {
    async fn store_exists(&self, store_id: &str) -> JobResult<bool> {
        Ok(queries::store_exists(&self.pool, store_id).await?)
    }

    async fn find_store(&self, store_id: &str) -> JobResult<Option<Store>> {
        Ok(queries::find_store(&self.pool, store_id).await?)
    }

    async fn create_job(&self) -> JobResult<Job> {
        Ok(queries::create_job(&self.pool).await?)
    }

    async fn get_job(&self, job_id: JobId) -> JobResult<Option<Job>> {
        Ok(queries::get_job(&self.pool, job_id).await?)
    }

    async fn job_exists(&self, job_id: JobId) -> JobResult<bool> {
        Ok(queries::job_exists(&self.pool, job_id).await?)
    }

    async fn update_job_status(&self, job_id: JobId, status: JobStatus) -> JobResult<()> {
        Ok(queries::update_job_status(&self.pool, job_id, status).await?)
    }

    async fn record_failure(&self, job_id: JobId, failure: &SubTaskFailure) -> JobResult<()> {
        Ok(queries::insert_job_failure(&self.pool, job_id, failure).await?)
    }

    async fn list_failures(&self, job_id: JobId) -> JobResult<Vec<SubTaskFailure>> {
        Ok(queries::get_job_failures(&self.pool, job_id).await?)
    }

    async fn store_image_result(&self, result: &ImageResult) -> JobResult<()> {
        Ok(queries::insert_image_result(&self.pool, result).await?)
    }

    async fn ping(&self) -> JobResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
