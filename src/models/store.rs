use serde::{Deserialize, Serialize};

/// Reference data for a retail store. Read-only from the job pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq, Eq)]
pub struct Store {
    pub store_id: String,
    pub store_name: String,
    pub area_code: String,
}

/// Metric computed for one image of one visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageResult {
    pub job_id: i64,
    pub store_id: String,
    pub image_url: String,
    pub perimeter: f64,
}
