//! Shared fixtures for pipeline and API tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use retail_pulse::app_state::AppState;
use retail_pulse::db::MemoryGateway;
use retail_pulse::models::job::{JobId, JobStatusView};
use retail_pulse::models::store::Store;
use retail_pulse::models::visit::{SubmitJobRequest, Visit};
use retail_pulse::services::analyzer::{AnalyzerError, ImageAnalyzer};
use retail_pulse::services::orchestrator::JobOrchestrator;

/// Outcome scripted for one image URL.
#[derive(Debug, Clone)]
pub enum Script {
    Metric(f64),
    Fail(&'static str),
    Panic,
    Delay(Duration, f64),
}

/// Analyzer that answers from a script instead of the network.
/// Unscripted URLs succeed with a perimeter of 100.
#[derive(Default)]
pub struct ScriptedAnalyzer {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, image_url: &str, script: Script) -> Self {
        self.scripts.insert(image_url.to_string(), script);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, image_url: &str) -> Result<f64, AnalyzerError> {
        self.calls.lock().unwrap().push(image_url.to_string());

        match self.scripts.get(image_url).cloned() {
            None => Ok(100.0),
            Some(Script::Metric(value)) => Ok(value),
            Some(Script::Fail(message)) => Err(AnalyzerError::Other(message.to_string())),
            Some(Script::Panic) => panic!("analyzer crashed on {image_url}"),
            Some(Script::Delay(delay, value)) => {
                sleep(delay).await;
                Ok(value)
            }
        }
    }
}

pub fn store(store_id: &str) -> Store {
    Store {
        store_id: store_id.to_string(),
        store_name: format!("Store {store_id}"),
        area_code: "7100001".to_string(),
    }
}

pub fn visit(store_id: &str, image_urls: &[&str]) -> Visit {
    Visit {
        store_id: store_id.to_string(),
        image_urls: image_urls.iter().map(|u| u.to_string()).collect(),
        visit_time: "2024-01-01T10:00:00Z".to_string(),
    }
}

pub fn request(visits: Vec<Visit>) -> SubmitJobRequest {
    SubmitJobRequest {
        count: visits.len(),
        visits,
    }
}

pub struct Harness {
    pub gateway: Arc<MemoryGateway>,
    pub analyzer: Arc<ScriptedAnalyzer>,
    pub jobs: JobOrchestrator,
}

impl Harness {
    pub fn new(stores: &[&str], analyzer: ScriptedAnalyzer) -> Self {
        Self::with_limit(stores, analyzer, 8)
    }

    pub fn with_limit(stores: &[&str], analyzer: ScriptedAnalyzer, max_visits: usize) -> Self {
        let gateway = Arc::new(MemoryGateway::with_stores(
            stores.iter().map(|id| store(id)),
        ));
        let analyzer = Arc::new(analyzer);
        let jobs = JobOrchestrator::new(gateway.clone(), analyzer.clone(), max_visits);
        Self {
            gateway,
            analyzer,
            jobs,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            db: self.gateway.clone(),
            jobs: self.jobs.clone(),
        }
    }
}

/// Poll until the job reaches a terminal status (with timeout)
pub async fn wait_for_terminal(jobs: &JobOrchestrator, job_id: JobId) -> JobStatusView {
    for _ in 0..200 {
        let view = jobs.get_status(job_id).await.expect("status lookup failed");
        if view.state.status().is_terminal() {
            return view;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish within 2 seconds");
}
