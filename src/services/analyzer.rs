use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Computes a scalar metric for one image reference.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, image_url: &str) -> Result<f64, AnalyzerError>;
}

/// Downloads an image over HTTP and measures its perimeter in pixels.
pub struct HttpImageAnalyzer {
    http: Client,
    delay: Duration,
}

impl HttpImageAnalyzer {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(http: Client) -> Self {
        Self {
            http,
            delay: Duration::ZERO,
        }
    }

    /// Add a fixed latency after every successful analysis, emulating a slower backend.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn download(&self, image_url: &str) -> Result<Vec<u8>, AnalyzerError> {
        let response = self
            .http
            .get(image_url)
            .send()
            .await
            .map_err(AnalyzerError::Download)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalyzerError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(AnalyzerError::Download)?;
        Ok(bytes.to_vec())
    }
}

impl Default for HttpImageAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageAnalyzer for HttpImageAnalyzer {
    async fn analyze(&self, image_url: &str) -> Result<f64, AnalyzerError> {
        let data = self.download(image_url).await?;
        tracing::debug!(image_url, bytes = data.len(), "Image downloaded");

        // Decoding is CPU-bound; keep it off the async workers.
        let (width, height) = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&data).map(|img| (img.width(), img.height()))
        })
        .await
        .map_err(AnalyzerError::Join)?
        .map_err(AnalyzerError::Decode)?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        Ok(perimeter(width, height))
    }
}

/// Perimeter of a `width` x `height` pixel rectangle.
pub fn perimeter(width: u32, height: u32) -> f64 {
    2.0 * (f64::from(width) + f64::from(height))
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("failed to download image: {0}")]
    Download(#[source] reqwest::Error),

    #[error("failed to download image: server responded with status {0}")]
    Status(u16),

    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("image decoding task aborted: {0}")]
    Join(#[source] tokio::task::JoinError),

    /// Raised by analyzers that are not HTTP-based.
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::io::Cursor;
    use tokio_test::{assert_err, assert_ok};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .expect("png encode");
        buf
    }

    /// Serve a fixed set of images on an ephemeral local port.
    async fn image_server() -> String {
        let ok = png(3, 5);
        let app = Router::new()
            .route("/ok.png", get(move || std::future::ready(ok.clone())))
            .route("/missing.png", get(|| async { StatusCode::NOT_FOUND }))
            .route("/junk.png", get(|| async { b"not an image".to_vec() }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    #[test]
    fn test_perimeter() {
        assert_eq!(perimeter(1, 1), 4.0);
        assert_eq!(perimeter(640, 480), 2240.0);
        assert_eq!(perimeter(0, 0), 0.0);
    }

    #[test]
    fn test_status_error_message() {
        let err = AnalyzerError::Status(404);
        assert_eq!(
            err.to_string(),
            "failed to download image: server responded with status 404"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_download_error() {
        let analyzer = HttpImageAnalyzer::new();
        let err = analyzer
            .analyze("http://127.0.0.1:9/missing.png")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Download(_)));
    }

    #[tokio::test]
    async fn test_downloaded_image_is_measured() {
        let base = image_server().await;
        let analyzer = HttpImageAnalyzer::new();

        let perimeter = assert_ok!(analyzer.analyze(&format!("{base}/ok.png")).await);
        assert_eq!(perimeter, 16.0);
    }

    #[tokio::test]
    async fn test_error_status_and_undecodable_body() {
        let base = image_server().await;
        let analyzer = HttpImageAnalyzer::new();

        let err = assert_err!(analyzer.analyze(&format!("{base}/missing.png")).await);
        assert!(matches!(err, AnalyzerError::Status(404)));

        let err = assert_err!(analyzer.analyze(&format!("{base}/junk.png")).await);
        assert!(matches!(err, AnalyzerError::Decode(_)));
    }
}
