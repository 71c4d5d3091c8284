//! Grok chat-completions data transfer objects.

use derive_builder::Builder;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct GrokMessage {
    /// `system`, `user` or `assistant`
    role: String,
    /// Message text
    content: String,
}

impl GrokMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat-completions request body.
#[derive(Debug, Clone, Serialize, Builder, Getters)]
#[builder(setter(into))]
pub struct GrokRequest {
    /// Model identifier
    model: String,
    /// Conversation
    messages: Vec<GrokMessage>,
    /// Upper bound on generated tokens
    max_tokens: u32,
    /// Sampling temperature
    temperature: f32,
    /// Nucleus sampling mass
    top_p: f32,
    /// Repetition penalty
    frequency_penalty: f32,
    /// Topic penalty
    presence_penalty: f32,
}

impl GrokRequest {
    /// Creates a new builder for `GrokRequest`.
    pub fn builder() -> GrokRequestBuilder {
        GrokRequestBuilder::default()
    }
}

/// Chat-completions response body.
#[derive(Debug, Clone, Deserialize, Getters)]
pub struct GrokResponse {
    /// Model that answered
    #[serde(default)]
    model: Option<String>,
    /// Candidate completions
    #[serde(default)]
    choices: Vec<GrokChoice>,
}

/// One completion candidate.
#[derive(Debug, Clone, Deserialize, Getters)]
pub struct GrokChoice {
    /// The generated message
    message: GrokMessage,
}

impl GrokResponse {
    /// Text of the first choice.
    pub fn first_text(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_str())
    }
}
