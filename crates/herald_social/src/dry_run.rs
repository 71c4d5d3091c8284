//! Platform that logs instead of posting.

use async_trait::async_trait;
use chrono::Utc;
use herald_core::{ImageRef, PostEngagement, PostReceipt, PostRequest};
use herald_error::PlatformError;
use herald_interface::SocialPlatform;
use tracing::info;
use uuid::Uuid;

/// Accepts every post without contacting any service.
///
/// Used by `herald cycle --dry-run` to exercise the whole pipeline.
#[derive(Debug, Clone)]
pub struct DryRunPlatform {
    max_text_length: usize,
}

impl DryRunPlatform {
    /// Create a dry-run platform with the given text limit.
    pub fn new(max_text_length: usize) -> Self {
        Self { max_text_length }
    }
}

#[async_trait]
impl SocialPlatform for DryRunPlatform {
    async fn post(&self, request: &PostRequest) -> Result<PostReceipt, PlatformError> {
        let id = format!("dry-run-{}", Uuid::new_v4());
        info!(
            post_id = %id,
            media = request.media_ids().len(),
            reply_to = ?request.in_reply_to(),
            text = %request.text(),
            "Dry run: post not published"
        );
        Ok(PostReceipt::new(id, Utc::now()))
    }

    async fn upload_media(&self, image: &ImageRef) -> Result<String, PlatformError> {
        info!(url = %image.url(), "Dry run: media not uploaded");
        Ok(format!("dry-run-media-{}", Uuid::new_v4()))
    }

    async fn engagement(&self, post_ids: &[String]) -> Result<Vec<PostEngagement>, PlatformError> {
        Ok(post_ids
            .iter()
            .map(|id| PostEngagement::new(id.clone(), 0, 0, 0, 0))
            .collect())
    }

    fn name(&self) -> &str {
        "dry_run"
    }

    fn max_text_length(&self) -> usize {
        self.max_text_length
    }
}
