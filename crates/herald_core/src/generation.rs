//! Inputs and outputs of the generator capabilities.

use crate::ImageRef;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A prompt sent to a generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Prompt {
    /// System instructions
    system: Option<String>,
    /// The request itself
    text: String,
}

impl Prompt {
    /// A prompt without system instructions.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            system: None,
            text: text.into(),
        }
    }

    /// Attach system instructions.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Sampling options passed to a text generator.
///
/// # Examples
///
/// ```
/// use herald_core::GenerationOptionsBuilder;
///
/// let options = GenerationOptionsBuilder::default()
///     .max_tokens(120u32)
///     .temperature(0.7)
///     .build()
///     .unwrap();
/// assert_eq!(*options.max_tokens(), 120);
/// ```
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(default)]
#[serde(default)]
pub struct GenerationOptions {
    /// Upper bound on generated tokens
    max_tokens: u32,
    /// Sampling temperature
    temperature: f32,
    /// Nucleus sampling mass
    top_p: f32,
    /// Penalty on repeated tokens
    frequency_penalty: f32,
    /// Penalty on already-present topics
    presence_penalty: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 100,
            temperature: 0.7,
            top_p: 0.9,
            frequency_penalty: 0.5,
            presence_penalty: 0.5,
        }
    }
}

/// Text returned by a content generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct GeneratedText {
    /// The generated text
    text: String,
    /// Model that produced it
    model: Option<String>,
}

impl GeneratedText {
    /// Wrap generated text.
    pub fn new(text: impl Into<String>, model: Option<String>) -> Self {
        Self {
            text: text.into(),
            model,
        }
    }
}

/// Image returned by an image generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct GeneratedImage {
    /// Where the image lives
    image: ImageRef,
}

impl GeneratedImage {
    /// Wrap a generated image reference.
    pub fn new(image: ImageRef) -> Self {
        Self { image }
    }

    /// Take the image reference.
    pub fn into_image(self) -> ImageRef {
        self.image
    }
}
