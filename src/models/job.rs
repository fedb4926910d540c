use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier assigned to a job by the persistence layer.
pub type JobId = i64;

/// Lifecycle state of a submitted job.
///
/// `Ongoing` is the only non-terminal state. A job leaves it exactly once,
/// after every visit has been processed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Ongoing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Ongoing)
    }
}

/// A persisted job row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a single visit did not complete. At most one is recorded per visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubTaskFailure {
    pub store_id: String,
    pub error: String,
}

impl SubTaskFailure {
    pub fn new(store_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            error: error.into(),
        }
    }
}

/// Job state as seen by a status query. Failures only exist on the failed branch.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    Ongoing,
    Completed,
    Failed { error: Vec<SubTaskFailure> },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Ongoing => JobStatus::Ongoing,
            JobState::Completed => JobStatus::Completed,
            JobState::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// Response body for `GET /api/status`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JobStatusView {
    #[serde(flatten)]
    pub state: JobState,
    pub job_id: JobId,
}

/// Response body for `POST /api/submit/`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
}
