//! Cycle records.

use crate::Dependency;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a posting cycle ended.
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
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CycleOutcome {
    /// An item was confirmed by the platform
    Posted,
    /// An item was marked failed
    Failed,
    /// A rate budget was exhausted; the work waits for the next cycle
    Deferred,
    /// A circuit was open; nothing was called
    Skipped,
    /// Content generation failed before an item existed
    Aborted,
    /// Shutdown interrupted the cycle
    Cancelled,
    /// Credentials were rejected; scheduling stops
    Halted,
    /// Nothing new to post
    Idle,
}

/// Append-only record of one posting cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct CycleRecord {
    /// Unique identifier
    id: Uuid,
    /// When the cycle began
    started_at: DateTime<Utc>,
    /// When the cycle ended
    finished_at: DateTime<Utc>,
    /// How it ended
    outcome: CycleOutcome,
    /// The item the cycle worked on
    content_item_id: Option<Uuid>,
    /// The dependency responsible for a non-posted outcome
    dependency: Option<Dependency>,
    /// Error text, if any
    error: Option<String>,
}

impl CycleRecord {
    /// Create a record for a finished cycle.
    pub fn new(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        outcome: CycleOutcome,
        content_item_id: Option<Uuid>,
        dependency: Option<Dependency>,
        error: Option<String>,
    ) -> Self {
        Self::from_parts(
            Uuid::new_v4(),
            started_at,
            finished_at,
            outcome,
            content_item_id,
            dependency,
            error,
        )
    }

    /// Rebuild a record read back from storage.
    pub fn from_parts(
        id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        outcome: CycleOutcome,
        content_item_id: Option<Uuid>,
        dependency: Option<Dependency>,
        error: Option<String>,
    ) -> Self {
        Self {
            id,
            started_at,
            finished_at,
            outcome,
            content_item_id,
            dependency,
            error,
        }
    }
}
