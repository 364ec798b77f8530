/// `ImageCapabilities` over the generation service's HTTP API
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use edit_studio::{EditOperation, Image, ImageCapabilities, ImageResponse};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::request::{edit_endpoint, EditRequest, GenerateRequest, GenerateResponse};
use crate::BackendError;

pub struct HttpBackend {
    config: BackendConfig,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        if !(config.api_url.starts_with("http://") || config.api_url.starts_with("https://")) {
            return Err(BackendError::InvalidUrl(config.api_url).into());
        }
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Plain text-to-image generation.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<ImageResponse> {
        self.post("generate", request).await
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<ImageResponse> {
        let url = self.config.endpoint(path);
        debug!(%url, "POST");
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(BackendError::from)
            .with_context(|| format!("POST {url}"))?;

        let status = response.status();
        let text = response.text().await.map_err(BackendError::from)?;
        if !status.is_success() {
            let message = serde_json::from_str::<GenerateResponse>(&text)
                .ok()
                .and_then(|body| body.error)
                .unwrap_or(text);
            warn!(%url, status = status.as_u16(), "generation service rejected request");
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let body: GenerateResponse = serde_json::from_str(&text)
            .with_context(|| format!("Invalid response from {url}"))?;
        Ok(body.into_image_response(status.as_u16())?)
    }
}

#[async_trait]
impl ImageCapabilities for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn is_available(&self) -> Result<bool> {
        match self.client.get(&self.config.api_url).send().await {
            Ok(response) => Ok(!response.status().is_server_error()),
            Err(err) => {
                debug!(error = %err, "generation service unreachable");
                Ok(false)
            }
        }
    }

    async fn edit(&self, image: &Image, operation: &EditOperation) -> Result<ImageResponse> {
        let request = EditRequest::new(image, operation);
        self.post(edit_endpoint(operation), &request).await
    }

    async fn regenerate(&self, instruction: &str, reference: &Image) -> Result<ImageResponse> {
        let request = GenerateRequest::regeneration(instruction, reference);
        self.post("generate", &request).await
    }
}
