use std::sync::Arc;

use crate::db::PersistenceGateway;
use crate::models::job::{JobId, SubTaskFailure};
use crate::models::store::ImageResult;
use crate::models::visit::Visit;
use crate::services::analyzer::ImageAnalyzer;

pub const STORE_NOT_FOUND: &str = "store not found";

/// Processes the images of a single visit, in order, stopping at the first error.
#[derive(Clone)]
pub struct VisitProcessor {
    gateway: Arc<dyn PersistenceGateway>,
    analyzer: Arc<dyn ImageAnalyzer>,
}

impl VisitProcessor {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, analyzer: Arc<dyn ImageAnalyzer>) -> Self {
        Self { gateway, analyzer }
    }

    /// Returns the visit's single failure if any step failed.
    ///
    /// The store is looked up again here: it may have been removed after the
    /// submission was validated, in which case only this visit fails.
    pub async fn process(&self, visit: &Visit, job_id: JobId) -> Result<(), SubTaskFailure> {
        match self.gateway.find_store(&visit.store_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(SubTaskFailure::new(&visit.store_id, STORE_NOT_FOUND)),
            Err(e) => return Err(SubTaskFailure::new(&visit.store_id, e.to_string())),
        }

        for image_url in &visit.image_urls {
            self.process_image(job_id, &visit.store_id, image_url)
                .await
                .map_err(|message| SubTaskFailure::new(&visit.store_id, message))?;
        }

        tracing::debug!(
            job_id,
            store_id = %visit.store_id,
            images = visit.image_urls.len(),
            "Visit processed"
        );

        Ok(())
    }

    async fn process_image(
        &self,
        job_id: JobId,
        store_id: &str,
        image_url: &str,
    ) -> Result<(), String> {
        let perimeter = self
            .analyzer
            .analyze(image_url)
            .await
            .map_err(|e| format!("image processing failed for image {image_url}: {e}"))?;

        let result = ImageResult {
            job_id,
            store_id: store_id.to_string(),
            image_url: image_url.to_string(),
            perimeter,
        };

        self.gateway
            .store_image_result(&result)
            .await
            .map_err(|e| format!("failed to store image result for image {image_url}: {e}"))?;

        metrics::counter!("images_analyzed_total").increment(1);
        tracing::debug!(job_id, store_id, image_url, perimeter, "Image analyzed");

        Ok(())
    }
}
