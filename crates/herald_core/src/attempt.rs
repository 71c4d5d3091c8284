//! Post attempts.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use herald_error::FailureClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of one attempt to post a content item.
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
pub enum AttemptOutcome {
    /// The platform confirmed the post
    Success,
    /// Throttled, locally or by the platform
    RateLimited,
    /// Timeout or retryable failure
    TransientError,
    /// Rejected for good
    PermanentError,
    /// Credentials rejected
    AuthError,
}

impl From<FailureClass> for AttemptOutcome {
    fn from(class: FailureClass) -> Self {
        match class {
            FailureClass::Transient => AttemptOutcome::TransientError,
            FailureClass::RateLimited => AttemptOutcome::RateLimited,
            FailureClass::Permanent => AttemptOutcome::PermanentError,
            FailureClass::Auth => AttemptOutcome::AuthError,
        }
    }
}

/// One append-only record of an attempt to post a content item.
///
/// `attempt_number` is 1-based and keeps increasing across cycles for the
/// same item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct PostAttempt {
    /// Unique identifier
    id: Uuid,
    /// The item being posted
    content_item_id: Uuid,
    /// 1-based attempt counter for the item
    attempt_number: u32,
    /// When the attempt finished
    timestamp: DateTime<Utc>,
    /// What happened
    outcome: AttemptOutcome,
    /// Platform identifier on success
    platform_response_id: Option<String>,
    /// Error text on failure
    error: Option<String>,
}

impl PostAttempt {
    /// Record a successful attempt.
    pub fn succeeded(
        content_item_id: Uuid,
        attempt_number: u32,
        platform_response_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content_item_id,
            attempt_number,
            timestamp,
            outcome: AttemptOutcome::Success,
            platform_response_id: Some(platform_response_id.into()),
            error: None,
        }
    }

    /// Record a failed attempt.
    pub fn failed(
        content_item_id: Uuid,
        attempt_number: u32,
        outcome: AttemptOutcome,
        error: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content_item_id,
            attempt_number,
            timestamp,
            outcome,
            platform_response_id: None,
            error: Some(error.into()),
        }
    }

    /// Rebuild an attempt read back from storage.
    pub fn from_parts(
        id: Uuid,
        content_item_id: Uuid,
        attempt_number: u32,
        timestamp: DateTime<Utc>,
        outcome: AttemptOutcome,
        platform_response_id: Option<String>,
        error: Option<String>,
    ) -> Self {
        Self {
            id,
            content_item_id,
            attempt_number,
            timestamp,
            outcome,
            platform_response_id,
            error,
        }
    }
}
