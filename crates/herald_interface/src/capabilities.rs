//! External service capabilities.

use async_trait::async_trait;
use herald_core::{
    GeneratedImage, GeneratedText, GenerationOptions, ImageRef, PostEngagement, PostReceipt,
    PostRequest, Prompt, TrendQuery, TrendSignal,
};
use herald_error::{GenerationError, PlatformError};

/// Produces post text from a prompt.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate text for `prompt`.
    async fn generate(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<GeneratedText, GenerationError>;

    /// Provider name used in logs.
    fn provider_name(&self) -> &str;
}

/// Produces an image from a prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate an image for `prompt`.
    async fn generate(&self, prompt: &Prompt) -> Result<GeneratedImage, GenerationError>;

    /// Provider name used in logs.
    fn provider_name(&self) -> &str;
}

/// Reports currently trending topics.
#[async_trait]
pub trait TrendSource: Send + Sync {
    /// Search for trending topics.
    async fn search(&self, query: &TrendQuery) -> Result<TrendSignal, GenerationError>;

    /// Provider name used in logs.
    fn provider_name(&self) -> &str;
}

/// A social platform that accepts posts.
#[async_trait]
pub trait SocialPlatform: Send + Sync {
    /// Publish a post.
    async fn post(&self, request: &PostRequest) -> Result<PostReceipt, PlatformError>;

    /// Upload an image and return the platform's media identifier.
    async fn upload_media(&self, image: &ImageRef) -> Result<String, PlatformError>;

    /// Public engagement counters for published posts, in one request.
    ///
    /// Posts the platform no longer knows are left out of the result.
    async fn engagement(&self, post_ids: &[String]) -> Result<Vec<PostEngagement>, PlatformError>;

    /// Platform name used in logs.
    fn name(&self) -> &str;

    /// Longest text the platform accepts, in characters.
    fn max_text_length(&self) -> usize;
}
