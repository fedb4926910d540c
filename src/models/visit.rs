use serde::{Deserialize, Serialize};

/// Request body for `POST /api/submit/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    pub count: usize,
    pub visits: Vec<Visit>,
}

/// One store visit: a store and the images captured there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub store_id: String,
    #[serde(rename = "image_url")]
    pub image_urls: Vec<String>,
    /// Carried through untouched; the service never interprets it.
    #[serde(default)]
    pub visit_time: String,
}
