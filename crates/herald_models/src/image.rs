//! Modal-hosted image generation client.

use crate::http::{error_body, error_from_reqwest, error_from_status};
use async_trait::async_trait;
use herald_core::{GeneratedImage, ImageRef, Prompt};
use herald_error::{GenerationError, GenerationErrorKind};
use herald_interface::ImageGenerator;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    image_url: Option<String>,
}

/// Image generation through an HTTP endpoint that answers `{"image_url": ...}`.
#[derive(Debug, Clone)]
pub struct ModalImageClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl ModalImageClient {
    /// Creates a client posting to `endpoint`.
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ImageGenerator for ModalImageClient {
    #[instrument(skip(self, prompt), fields(endpoint = %self.endpoint))]
    async fn generate(&self, prompt: &Prompt) -> Result<GeneratedImage, GenerationError> {
        debug!("Requesting image");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ImageRequest {
                prompt: prompt.text(),
            })
            .send()
            .await
            .map_err(error_from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), error_body(response).await));
        }

        let parsed: ImageResponse = response.json().await.map_err(error_from_reqwest)?;
        let url = parsed.image_url.filter(|url| !url.is_empty()).ok_or_else(|| {
            GenerationError::new(GenerationErrorKind::MalformedResponse(
                "response is missing image_url".to_string(),
            ))
        })?;

        Ok(GeneratedImage::new(ImageRef::new(
            url,
            Some(prompt.text().clone()),
        )))
    }

    fn provider_name(&self) -> &str {
        "modal"
    }
}
