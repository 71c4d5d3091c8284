//! Persistence traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::{ContentItem, CycleRecord, Dependency, EngagementSnapshot, PostAttempt};
use herald_error::DatabaseResult;
use herald_rate_limit::DependencyState;
use uuid::Uuid;

/// Content items, post attempts, cycle records and engagement snapshots.
///
/// Content items are status-mutable until terminal; attempts and cycle
/// records are append-only.
///
/// Workers sharing a store coordinate through claims: a worker posts an
/// item only while it holds the item's claim. A claim lapses at its lease
/// deadline, so a crashed worker cannot strand an item.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Insert or update an item.
    ///
    /// Implementations reject any write that would change an item already
    /// stored as `posted`.
    async fn save_item(&self, item: &ContentItem) -> DatabaseResult<()>;

    /// Fetch an item by id.
    async fn get_item(&self, id: Uuid) -> DatabaseResult<Option<ContentItem>>;

    /// Claim the oldest `queued` item that no other worker holds.
    ///
    /// Items are ordered by creation time, then thread position. Selecting
    /// and claiming is one atomic step: two workers never receive the same
    /// item while a claim is live. The claim lasts until `lease_until`.
    async fn claim_next_queued(
        &self,
        worker: Uuid,
        lease_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Option<ContentItem>>;

    /// Claim `item_id` for `worker` until `lease_until`.
    ///
    /// Returns `false` when the item does not exist or another worker holds
    /// a claim that is still live at `now`. Re-claiming extends the lease.
    async fn claim_item(
        &self,
        item_id: Uuid,
        worker: Uuid,
        lease_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DatabaseResult<bool>;

    /// Drop `worker`'s claim on `item_id`; other workers' claims are kept.
    async fn release_claim(&self, item_id: Uuid, worker: Uuid) -> DatabaseResult<()>;

    /// Every item of `thread_id`, by position.
    async fn thread_items(&self, thread_id: Uuid) -> DatabaseResult<Vec<ContentItem>>;

    /// Items posted at or after `since`, newest first.
    async fn posted_since(&self, since: DateTime<Utc>) -> DatabaseResult<Vec<ContentItem>>;

    /// Most recently created items, newest first.
    async fn recent_items(&self, limit: usize) -> DatabaseResult<Vec<ContentItem>>;

    /// Append a post attempt.
    async fn append_attempt(&self, attempt: &PostAttempt) -> DatabaseResult<()>;

    /// Every attempt for an item, oldest first.
    async fn attempts_for(&self, item_id: Uuid) -> DatabaseResult<Vec<PostAttempt>>;

    /// Append a cycle record.
    async fn record_cycle(&self, record: &CycleRecord) -> DatabaseResult<()>;

    /// Most recent cycle records, newest first.
    async fn recent_cycles(&self, limit: usize) -> DatabaseResult<Vec<CycleRecord>>;

    /// Store `snapshot`, replacing any earlier one for the same item.
    async fn record_engagement(&self, snapshot: &EngagementSnapshot) -> DatabaseResult<()>;

    /// The stored snapshot for `item_id`.
    async fn engagement_for(&self, item_id: Uuid) -> DatabaseResult<Option<EngagementSnapshot>>;
}

/// Versioned per-dependency rate budget and circuit state.
#[async_trait]
pub trait DependencyStateStore: Send + Sync {
    /// Read the stored state for `dependency`.
    async fn load(&self, dependency: Dependency) -> DatabaseResult<Option<DependencyState>>;

    /// Write `state` if the stored version still equals `state.version()`.
    ///
    /// A version of 0 means "not stored yet". On success the stored copy is
    /// returned with its version bumped; on a version conflict `None` is
    /// returned and nothing is written.
    async fn compare_and_swap(
        &self,
        state: &DependencyState,
    ) -> DatabaseResult<Option<DependencyState>>;

    /// Every stored state.
    async fn load_all(&self) -> DatabaseResult<Vec<DependencyState>>;
}
