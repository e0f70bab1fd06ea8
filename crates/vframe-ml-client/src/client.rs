//! ML service HTTP client.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use vframe_media::{BackgroundRemover, MediaResult};

use crate::error::{MlError, MlResult};
use crate::types::HealthResponse;

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of ML service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ML_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("ML_SERVICE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("ML_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

/// Client for the background-removal service.
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new ML client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    pub fn config(&self) -> &MlClientConfig {
        &self.config
    }

    /// Check if ML service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.is_healthy())
            }
            Ok(response) => {
                warn!("ML service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ML service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Upload a PNG frame and return the service's PNG answer.
    pub async fn remove_background(&self, png: Vec<u8>) -> MlResult<Vec<u8>> {
        let url = format!("{}/api/remove", self.config.base_url);

        debug!(bytes = png.len(), "Sending background removal request to {}", url);

        let response = self
            .with_retry(|| {
                let png = png.clone();
                let url = url.clone();
                async move {
                    let part = Part::bytes(png)
                        .file_name("frame.png")
                        .mime_str("image/png")?;
                    let form = Form::new().part("file", part);

                    let response = self.http.post(&url).multipart(form).send().await?;
                    match response.status() {
                        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => Err(
                            MlError::ServiceUnavailable(format!("ML service returned {}", response.status())),
                        ),
                        _ => Ok(response),
                    }
                }
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::RequestFailed(format!(
                "ML service returned {}: {}",
                status, body
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(200 * 2u64.pow(attempt));
                    warn!(
                        "ML request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(MlError::RequestFailed("Unknown error".to_string())))
    }
}

/// [`BackgroundRemover`] backed by the remote ML service.
pub struct RemoteBackgroundRemover {
    client: MlClient,
}

impl RemoteBackgroundRemover {
    pub fn new(client: MlClient) -> Self {
        Self { client }
    }

    pub fn from_env() -> MlResult<Self> {
        Ok(Self::new(MlClient::from_env()?))
    }

    async fn round_trip(&self, image: RgbImage) -> MlResult<RgbaImage> {
        let (width, height) = image.dimensions();

        let png = tokio::task::spawn_blocking(move || encode_png(image))
            .await
            .map_err(|e| MlError::RequestFailed(e.to_string()))??;

        let body = self.client.remove_background(png).await?;

        let rgba = tokio::task::spawn_blocking(move || decode_rgba(&body))
            .await
            .map_err(|e| MlError::InvalidResponse(e.to_string()))??;

        if rgba.dimensions() != (width, height) {
            return Err(MlError::InvalidResponse(format!(
                "expected {}x{} image, got {}x{}",
                width,
                height,
                rgba.width(),
                rgba.height()
            )));
        }
        Ok(rgba)
    }
}

#[async_trait]
impl BackgroundRemover for RemoteBackgroundRemover {
    async fn remove(&self, image: RgbImage) -> MediaResult<RgbaImage> {
        Ok(self.round_trip(image).await?)
    }

    fn name(&self) -> &'static str {
        "remote"
    }

    async fn health_check(&self) -> bool {
        self.client.health_check().await.unwrap_or(false)
    }
}

fn encode_png(image: RgbImage) -> MlResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

fn decode_rgba(bytes: &[u8]) -> MlResult<RgbaImage> {
    let decoded: DynamicImage = image::load_from_memory(bytes)?;
    Ok(decoded.into_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};
    use vframe_media::MediaError;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, max_retries: u32) -> MlClientConfig {
        MlClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            max_retries,
        }
    }

    fn rgba_png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([1, 2, 3, 0]));
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_config_defaults() {
        let config = MlClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 2);
    }

    #[tokio::test]
    async fn test_remote_remover_returns_alpha() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/remove"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(rgba_png(4, 3), "image/png"))
            .expect(1)
            .mount(&server)
            .await;

        let remover = RemoteBackgroundRemover::new(MlClient::new(config_for(&server, 0)).unwrap());
        let rgba = remover
            .remove(RgbImage::from_pixel(4, 3, Rgb([10, 10, 10])))
            .await
            .unwrap();

        assert_eq!(rgba.dimensions(), (4, 3));
        assert_eq!(rgba.get_pixel(0, 0)[3], 0);
    }

    #[tokio::test]
    async fn test_remote_remover_rejects_wrong_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/remove"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(rgba_png(2, 2), "image/png"))
            .mount(&server)
            .await;

        let remover = RemoteBackgroundRemover::new(MlClient::new(config_for(&server, 0)).unwrap());
        let result = remover.remove(RgbImage::new(4, 3)).await;

        assert!(matches!(result, Err(MediaError::BackgroundRemoval(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/remove"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .expect(1)
            .mount(&server)
            .await;

        let client = MlClient::new(config_for(&server, 2)).unwrap();
        let result = client.remove_background(vec![0u8; 8]).await;

        match result {
            Err(MlError::RequestFailed(msg)) => assert!(msg.contains("model crashed")),
            other => panic!("unexpected result: {:?}", other.map(|b| b.len())),
        }
    }

    #[tokio::test]
    async fn test_unavailable_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/remove"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/remove"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(rgba_png(1, 1), "image/png"))
            .mount(&server)
            .await;

        let client = MlClient::new(config_for(&server, 1)).unwrap();
        let body = client.remove_background(vec![0u8; 8]).await.unwrap();

        assert!(!body.is_empty());
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})),
            )
            .mount(&server)
            .await;

        let remover = RemoteBackgroundRemover::new(MlClient::new(config_for(&server, 0)).unwrap());
        assert!(remover.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let config = MlClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(500),
            max_retries: 0,
        };
        let client = MlClient::new(config).unwrap();
        assert!(!client.health_check().await.unwrap());
    }
}
