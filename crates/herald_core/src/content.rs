//! Content items and their publication lifecycle.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use herald_error::{ContentError, ContentErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Publication status of a content item.
///
/// ```text
/// draft ──► queued ──► posted
///   │          │
///   └──────────┴─────► failed
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentStatus {
    /// Assembled but not yet handed to the poster
    Draft,
    /// Waiting for the platform to confirm a post
    Queued,
    /// Confirmed by the platform
    Posted,
    /// Abandoned after a permanent failure
    Failed,
}

impl ContentStatus {
    /// Whether the status can never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContentStatus::Posted | ContentStatus::Failed)
    }

    /// Whether moving from `self` to `next` follows the lifecycle.
    ///
    /// # Examples
    ///
    /// ```
    /// use herald_core::ContentStatus;
    ///
    /// assert!(ContentStatus::Draft.can_transition_to(ContentStatus::Queued));
    /// assert!(!ContentStatus::Posted.can_transition_to(ContentStatus::Queued));
    /// assert!(!ContentStatus::Queued.can_transition_to(ContentStatus::Queued));
    /// ```
    pub fn can_transition_to(&self, next: ContentStatus) -> bool {
        matches!(
            (self, next),
            (ContentStatus::Draft, ContentStatus::Queued)
                | (ContentStatus::Draft, ContentStatus::Failed)
                | (ContentStatus::Queued, ContentStatus::Posted)
                | (ContentStatus::Queued, ContentStatus::Failed)
        )
    }
}

/// Reference to a generated image hosted by the image service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct ImageRef {
    /// Location the image can be fetched from
    url: String,
    /// Alternative text for accessibility
    alt_text: Option<String>,
}

impl ImageRef {
    /// Create a reference to an image at `url`.
    pub fn new(url: impl Into<String>, alt_text: Option<String>) -> Self {
        Self {
            url: url.into(),
            alt_text,
        }
    }
}

/// A unit of content produced by the orchestrator and posted to a platform.
///
/// Status changes go through [`ContentItem::transition`]; terminal items
/// reject every mutation.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use herald_core::{ContentItem, ContentStatus};
///
/// let now = Utc::now();
/// let mut item = ContentItem::draft("Rust 2024 is out", None, Some("rust".into()), now);
/// item.mark_queued(now).unwrap();
/// item.mark_posted("1850000000000000000", now).unwrap();
///
/// assert_eq!(*item.status(), ContentStatus::Posted);
/// assert!(item.mark_failed(now).is_err());
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct ContentItem {
    /// Unique identifier
    id: Uuid,
    /// Sanitized post text
    text: String,
    /// Attached image, if any
    #[builder(default)]
    image: Option<ImageRef>,
    /// Trend topic the text was generated from
    #[builder(default)]
    source_trend: Option<String>,
    /// Creation time
    created_at: DateTime<Utc>,
    /// Last status change
    updated_at: DateTime<Utc>,
    /// Publication status
    status: ContentStatus,
    /// Identifier assigned by the platform once posted
    #[builder(default)]
    platform_post_id: Option<String>,
    /// Thread this item belongs to, if posted as part of one
    #[builder(default)]
    #[serde(default)]
    thread_id: Option<Uuid>,
    /// Zero-based position within the thread
    #[builder(default)]
    #[serde(default)]
    thread_position: u32,
}

impl ContentItem {
    /// Create a new item in `draft`.
    pub fn draft(
        text: impl Into<String>,
        image: Option<ImageRef>,
        source_trend: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            image,
            source_trend,
            created_at: now,
            updated_at: now,
            status: ContentStatus::Draft,
            platform_post_id: None,
            thread_id: None,
            thread_position: 0,
        }
    }

    /// Place the item at `position` within `thread_id`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use herald_core::ContentItem;
    /// use uuid::Uuid;
    ///
    /// let thread = Uuid::new_v4();
    /// let item = ContentItem::draft("Part two.", None, None, Utc::now()).in_thread(thread, 1);
    /// assert_eq!(*item.thread_id(), Some(thread));
    /// assert!(!item.is_thread_head());
    /// ```
    pub fn in_thread(mut self, thread_id: Uuid, position: u32) -> Self {
        self.thread_id = Some(thread_id);
        self.thread_position = position;
        self
    }

    /// Whether the item is a standalone post or opens its thread.
    pub fn is_thread_head(&self) -> bool {
        self.thread_position == 0
    }

    /// Whether the item reached `posted` or `failed`.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move the item to `next`, rejecting anything outside the lifecycle.
    #[track_caller]
    pub fn transition(&mut self, next: ContentStatus, now: DateTime<Utc>) -> Result<(), ContentError> {
        if self.status.is_terminal() {
            return Err(ContentError::new(ContentErrorKind::Immutable {
                id: self.id.to_string(),
                status: self.status.to_string(),
            }));
        }
        if !self.status.can_transition_to(next) {
            return Err(ContentError::new(ContentErrorKind::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            }));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// `draft → queued`.
    #[track_caller]
    pub fn mark_queued(&mut self, now: DateTime<Utc>) -> Result<(), ContentError> {
        self.transition(ContentStatus::Queued, now)
    }

    /// `queued → posted`, recording the platform's identifier.
    #[track_caller]
    pub fn mark_posted(
        &mut self,
        platform_post_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ContentError> {
        self.transition(ContentStatus::Posted, now)?;
        self.platform_post_id = Some(platform_post_id.into());
        Ok(())
    }

    /// `draft | queued → failed`.
    #[track_caller]
    pub fn mark_failed(&mut self, now: DateTime<Utc>) -> Result<(), ContentError> {
        self.transition(ContentStatus::Failed, now)
    }
}
