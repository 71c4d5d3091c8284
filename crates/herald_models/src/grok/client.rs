//! Grok API client.

use super::{GrokMessage, GrokRequest, GrokResponse};
use crate::http::{error_body, error_from_reqwest, error_from_status};
use async_trait::async_trait;
use herald_core::{GeneratedText, GenerationOptions, Prompt};
use herald_error::{GenerationError, GenerationErrorKind};
use herald_interface::ContentGenerator;
use reqwest::Client;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
const DEFAULT_MODEL: &str = "grok-beta";

/// Text generation through x.ai's chat-completions API.
#[derive(Debug, Clone)]
pub struct GrokClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GrokClient {
    /// Creates a client for the default model and endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Use a different API root, e.g. a proxy or a test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a different model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_request(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<GrokRequest, GenerationError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = prompt.system() {
            messages.push(GrokMessage::system(system.clone()));
        }
        messages.push(GrokMessage::user(prompt.text().clone()));

        GrokRequest::builder()
            .model(self.model.clone())
            .messages(messages)
            .max_tokens(*options.max_tokens())
            .temperature(*options.temperature())
            .top_p(*options.top_p())
            .frequency_penalty(*options.frequency_penalty())
            .presence_penalty(*options.presence_penalty())
            .build()
            .map_err(|e| GenerationError::new(GenerationErrorKind::InvalidInput(e.to_string())))
    }
}

#[async_trait]
impl ContentGenerator for GrokClient {
    #[instrument(skip(self, prompt, options), fields(model = %self.model))]
    async fn generate(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<GeneratedText, GenerationError> {
        let body = self.build_request(prompt, options)?;
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, "Sending Grok request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(error_from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), error_body(response).await));
        }

        let parsed: GrokResponse = response.json().await.map_err(error_from_reqwest)?;
        let text = parsed
            .first_text()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                GenerationError::new(GenerationErrorKind::MalformedResponse(
                    "response contained no text".to_string(),
                ))
            })?;

        Ok(GeneratedText::new(
            text,
            parsed.model().clone().or_else(|| Some(self.model.clone())),
        ))
    }

    fn provider_name(&self) -> &str {
        "grok"
    }
}
