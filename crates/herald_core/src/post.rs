//! Platform post requests and receipts.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// What the platform client is asked to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct PostRequest {
    /// Post text
    text: String,
    /// Media identifiers returned by earlier uploads
    media_ids: Vec<String>,
    /// Platform identifier of the post this one replies to
    #[serde(default)]
    in_reply_to: Option<String>,
}

impl PostRequest {
    /// A text-only post.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media_ids: Vec::new(),
            in_reply_to: None,
        }
    }

    /// Publish as a reply to `post_id`, continuing a thread.
    pub fn with_reply_to(mut self, post_id: impl Into<String>) -> Self {
        self.in_reply_to = Some(post_id.into());
        self
    }

    /// Attach an uploaded media identifier.
    pub fn with_media(mut self, media_id: impl Into<String>) -> Self {
        self.media_ids.push(media_id.into());
        self
    }
}

/// Platform confirmation of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct PostReceipt {
    /// Identifier assigned by the platform
    id: String,
    /// When the platform accepted it
    timestamp: DateTime<Utc>,
}

impl PostReceipt {
    /// Create a receipt.
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp,
        }
    }
}
