use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors raised by the job pipeline.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The submission is malformed or inconsistent. No job was created.
    #[error("{0}")]
    Validation(String),

    /// An unknown job or store identifier.
    #[error("{0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persistence failure that did not originate in sqlx.
    #[error("persistence error: {0}")]
    Persistence(String),
}

pub type JobResult<T> = Result<T, JobError>;

impl JobError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            JobError::Validation(_) | JobError::NotFound(_) => StatusCode::BAD_REQUEST,
            JobError::Database(_) | JobError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, self.to_string()).into_response()
    }
}
