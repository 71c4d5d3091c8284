//! In-process stores.

use crate::check_overwrite;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::{
    ContentItem, ContentStatus, CycleRecord, Dependency, EngagementSnapshot, PostAttempt,
};
use herald_error::DatabaseResult;
use herald_interface::{AnalyticsStore, DependencyStateStore};
use herald_rate_limit::DependencyState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct Claim {
    worker: Uuid,
    until: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct AnalyticsTables {
    items: HashMap<Uuid, ContentItem>,
    claims: HashMap<Uuid, Claim>,
    attempts: Vec<PostAttempt>,
    cycles: Vec<CycleRecord>,
    engagement: HashMap<Uuid, EngagementSnapshot>,
}

impl AnalyticsTables {
    fn claimable(&self, item_id: &Uuid, worker: Uuid, now: DateTime<Utc>) -> bool {
        self.claims
            .get(item_id)
            .is_none_or(|claim| claim.worker == worker || claim.until <= now)
    }
}

/// Analytics store kept in memory. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAnalyticsStore {
    tables: Arc<Mutex<AnalyticsTables>>,
}

impl InMemoryAnalyticsStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored post attempts.
    pub fn attempt_count(&self) -> usize {
        self.tables.lock().attempts.len()
    }
}

#[async_trait]
impl AnalyticsStore for InMemoryAnalyticsStore {
    #[instrument(skip(self, item), fields(item_id = %item.id(), status = %item.status()))]
    async fn save_item(&self, item: &ContentItem) -> DatabaseResult<()> {
        let mut tables = self.tables.lock();
        if let Some(existing) = tables.items.get(item.id()) {
            if !check_overwrite(existing, item)? {
                debug!("Terminal item unchanged, skipping write");
                return Ok(());
            }
        }
        tables.items.insert(*item.id(), item.clone());
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> DatabaseResult<Option<ContentItem>> {
        Ok(self.tables.lock().items.get(&id).cloned())
    }

    async fn claim_next_queued(
        &self,
        worker: Uuid,
        lease_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Option<ContentItem>> {
        let mut tables = self.tables.lock();
        let next = tables
            .items
            .values()
            .filter(|item| *item.status() == ContentStatus::Queued)
            .filter(|item| tables.claimable(item.id(), worker, now))
            .min_by_key(|item| (*item.created_at(), *item.thread_position()))
            .cloned();
        if let Some(item) = &next {
            tables.claims.insert(
                *item.id(),
                Claim {
                    worker,
                    until: lease_until,
                },
            );
        }
        Ok(next)
    }

    async fn claim_item(
        &self,
        item_id: Uuid,
        worker: Uuid,
        lease_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        let mut tables = self.tables.lock();
        if !tables.items.contains_key(&item_id) || !tables.claimable(&item_id, worker, now) {
            return Ok(false);
        }
        tables.claims.insert(
            item_id,
            Claim {
                worker,
                until: lease_until,
            },
        );
        Ok(true)
    }

    async fn release_claim(&self, item_id: Uuid, worker: Uuid) -> DatabaseResult<()> {
        let mut tables = self.tables.lock();
        if tables
            .claims
            .get(&item_id)
            .is_some_and(|claim| claim.worker == worker)
        {
            tables.claims.remove(&item_id);
        }
        Ok(())
    }

    async fn thread_items(&self, thread_id: Uuid) -> DatabaseResult<Vec<ContentItem>> {
        let tables = self.tables.lock();
        let mut items: Vec<_> = tables
            .items
            .values()
            .filter(|item| *item.thread_id() == Some(thread_id))
            .cloned()
            .collect();
        items.sort_by_key(|item| *item.thread_position());
        Ok(items)
    }

    async fn posted_since(&self, since: DateTime<Utc>) -> DatabaseResult<Vec<ContentItem>> {
        let tables = self.tables.lock();
        let mut items: Vec<_> = tables
            .items
            .values()
            .filter(|item| *item.status() == ContentStatus::Posted && *item.updated_at() >= since)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.updated_at().cmp(a.updated_at()));
        Ok(items)
    }

    async fn recent_items(&self, limit: usize) -> DatabaseResult<Vec<ContentItem>> {
        let tables = self.tables.lock();
        let mut items: Vec<_> = tables.items.values().cloned().collect();
        items.sort_by(|a, b| b.created_at().cmp(a.created_at()));
        items.truncate(limit);
        Ok(items)
    }

    #[instrument(skip(self, attempt), fields(item_id = %attempt.content_item_id(), attempt = attempt.attempt_number()))]
    async fn append_attempt(&self, attempt: &PostAttempt) -> DatabaseResult<()> {
        self.tables.lock().attempts.push(attempt.clone());
        Ok(())
    }

    async fn attempts_for(&self, item_id: Uuid) -> DatabaseResult<Vec<PostAttempt>> {
        let tables = self.tables.lock();
        let mut attempts: Vec<_> = tables
            .attempts
            .iter()
            .filter(|attempt| *attempt.content_item_id() == item_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|attempt| *attempt.attempt_number());
        Ok(attempts)
    }

    async fn record_cycle(&self, record: &CycleRecord) -> DatabaseResult<()> {
        self.tables.lock().cycles.push(record.clone());
        Ok(())
    }

    async fn recent_cycles(&self, limit: usize) -> DatabaseResult<Vec<CycleRecord>> {
        let tables = self.tables.lock();
        Ok(tables.cycles.iter().rev().take(limit).cloned().collect())
    }

    async fn record_engagement(&self, snapshot: &EngagementSnapshot) -> DatabaseResult<()> {
        self.tables
            .lock()
            .engagement
            .insert(*snapshot.content_item_id(), snapshot.clone());
        Ok(())
    }

    async fn engagement_for(&self, item_id: Uuid) -> DatabaseResult<Option<EngagementSnapshot>> {
        Ok(self.tables.lock().engagement.get(&item_id).cloned())
    }
}

/// Dependency state kept in memory. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDependencyStateStore {
    states: Arc<Mutex<HashMap<Dependency, DependencyState>>>,
}

impl InMemoryDependencyStateStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DependencyStateStore for InMemoryDependencyStateStore {
    async fn load(&self, dependency: Dependency) -> DatabaseResult<Option<DependencyState>> {
        Ok(self.states.lock().get(&dependency).cloned())
    }

    #[instrument(skip(self, state), fields(dependency = %state.dependency(), version = state.version()))]
    async fn compare_and_swap(
        &self,
        state: &DependencyState,
    ) -> DatabaseResult<Option<DependencyState>> {
        let mut states = self.states.lock();
        let stored_version = states
            .get(state.dependency())
            .map(|stored| *stored.version())
            .unwrap_or(0);
        if stored_version != *state.version() {
            debug!(stored_version, "Version conflict");
            return Ok(None);
        }
        let written = state.clone().with_version(stored_version + 1);
        states.insert(*state.dependency(), written.clone());
        Ok(Some(written))
    }

    async fn load_all(&self) -> DatabaseResult<Vec<DependencyState>> {
        let mut states: Vec<_> = self.states.lock().values().cloned().collect();
        states.sort_by_key(|state| *state.dependency());
        Ok(states)
    }
}
