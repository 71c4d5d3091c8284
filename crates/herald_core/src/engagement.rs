//! Engagement counters reported by the platform for published posts.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public counters for one published post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct PostEngagement {
    /// Platform identifier of the post
    post_id: String,
    /// Times the post was shown
    impressions: u64,
    /// Likes
    likes: u64,
    /// Reposts (retweets)
    reposts: u64,
    /// Direct replies
    replies: u64,
}

impl PostEngagement {
    /// Counters for `post_id`.
    pub fn new(post_id: impl Into<String>, impressions: u64, likes: u64, reposts: u64, replies: u64) -> Self {
        Self {
            post_id: post_id.into(),
            impressions,
            likes,
            reposts,
            replies,
        }
    }
}

/// The latest engagement counters stored for a content item.
///
/// One snapshot per item; a refresh replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct EngagementSnapshot {
    /// Item the post was published from
    content_item_id: Uuid,
    /// Counters as reported by the platform
    engagement: PostEngagement,
    /// When the counters were fetched
    fetched_at: DateTime<Utc>,
}

impl EngagementSnapshot {
    /// Snapshot of `engagement` for `content_item_id`, fetched at `fetched_at`.
    pub fn new(content_item_id: Uuid, engagement: PostEngagement, fetched_at: DateTime<Utc>) -> Self {
        Self {
            content_item_id,
            engagement,
            fetched_at,
        }
    }
}
