mod common;

use async_trait::async_trait;
use common::{PostReply, StubGenerator, StubPlatform, text_only_config};
use herald_bot::{HeraldMetrics, Orchestrator, Scheduler, SchedulerExit, shutdown_channel};
use chrono::{DateTime, Utc};
use herald_core::{ContentItem, CycleRecord, EngagementSnapshot, PostAttempt};
use herald_database::{InMemoryAnalyticsStore, InMemoryDependencyStateStore};
use herald_error::{DatabaseError, DatabaseErrorKind, DatabaseResult, PlatformErrorKind};
use herald_interface::{AnalyticsStore, SocialPlatform};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Fails the first `failures` claims of queued items.
struct FlakyStore {
    inner: InMemoryAnalyticsStore,
    failures: AtomicUsize,
}

#[async_trait]
impl AnalyticsStore for FlakyStore {
    async fn save_item(&self, item: &ContentItem) -> DatabaseResult<()> {
        self.inner.save_item(item).await
    }

    async fn get_item(&self, id: Uuid) -> DatabaseResult<Option<ContentItem>> {
        self.inner.get_item(id).await
    }

    async fn claim_next_queued(
        &self,
        worker: Uuid,
        lease_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Option<ContentItem>> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(DatabaseError::new(DatabaseErrorKind::Connection(
                "connection reset".into(),
            )));
        }
        self.inner.claim_next_queued(worker, lease_until, now).await
    }

    async fn claim_item(
        &self,
        item_id: Uuid,
        worker: Uuid,
        lease_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        self.inner.claim_item(item_id, worker, lease_until, now).await
    }

    async fn release_claim(&self, item_id: Uuid, worker: Uuid) -> DatabaseResult<()> {
        self.inner.release_claim(item_id, worker).await
    }

    async fn thread_items(&self, thread_id: Uuid) -> DatabaseResult<Vec<ContentItem>> {
        self.inner.thread_items(thread_id).await
    }

    async fn posted_since(&self, since: DateTime<Utc>) -> DatabaseResult<Vec<ContentItem>> {
        self.inner.posted_since(since).await
    }

    async fn recent_items(&self, limit: usize) -> DatabaseResult<Vec<ContentItem>> {
        self.inner.recent_items(limit).await
    }

    async fn append_attempt(&self, attempt: &PostAttempt) -> DatabaseResult<()> {
        self.inner.append_attempt(attempt).await
    }

    async fn attempts_for(&self, item_id: Uuid) -> DatabaseResult<Vec<PostAttempt>> {
        self.inner.attempts_for(item_id).await
    }

    async fn record_cycle(&self, record: &CycleRecord) -> DatabaseResult<()> {
        self.inner.record_cycle(record).await
    }

    async fn recent_cycles(&self, limit: usize) -> DatabaseResult<Vec<CycleRecord>> {
        self.inner.recent_cycles(limit).await
    }

    async fn record_engagement(&self, snapshot: &EngagementSnapshot) -> DatabaseResult<()> {
        self.inner.record_engagement(snapshot).await
    }

    async fn engagement_for(&self, item_id: Uuid) -> DatabaseResult<Option<EngagementSnapshot>> {
        self.inner.engagement_for(item_id).await
    }
}

fn orchestrator(
    platform: Arc<StubPlatform>,
    analytics: Arc<dyn AnalyticsStore>,
    metrics: HeraldMetrics,
) -> Arc<Orchestrator> {
    let platform: Arc<dyn SocialPlatform> = platform;
    Arc::new(
        Orchestrator::builder()
            .config(text_only_config())
            .generator(Arc::new(StubGenerator::new()))
            .platform(platform)
            .analytics(analytics)
            .state_store(Arc::new(InMemoryDependencyStateStore::new()))
            .metrics(metrics)
            .build()
            .unwrap(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_halts_scheduler() {
    let platform = Arc::new(StubPlatform::with_fallback(PostReply::Fail(
        PlatformErrorKind::Unauthorized("401 Unauthorized".into()),
    )));
    let metrics = HeraldMetrics::new().unwrap();
    let orchestrator = orchestrator(
        platform.clone(),
        Arc::new(InMemoryAnalyticsStore::new()),
        metrics.clone(),
    );
    let (_trigger, shutdown) = shutdown_channel();

    let exit = Scheduler::new(orchestrator, Duration::from_secs(3600))
        .run(shutdown)
        .await;

    assert_eq!(exit, SchedulerExit::Halted);
    assert_eq!(platform.calls(), 1);
    assert_eq!(metrics.snapshot().cycles["halted"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_runs_every_interval_until_shutdown() {
    let platform = Arc::new(StubPlatform::new());
    let orchestrator = orchestrator(
        platform.clone(),
        Arc::new(InMemoryAnalyticsStore::new()),
        HeraldMetrics::new().unwrap(),
    );
    let (trigger, shutdown) = shutdown_channel();

    let scheduler = Scheduler::new(orchestrator, Duration::from_secs(60));
    let task = tokio::spawn(async move { scheduler.run(shutdown).await });

    tokio::time::sleep(Duration::from_secs(150)).await;
    trigger.trigger();

    assert_eq!(task.await.unwrap(), SchedulerExit::Shutdown);
    // Ticks at 0s, 60s and 120s.
    assert_eq!(platform.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cycle_errors_are_counted_and_loop_continues() {
    let platform = Arc::new(StubPlatform::new());
    let metrics = HeraldMetrics::new().unwrap();
    let store = Arc::new(FlakyStore {
        inner: InMemoryAnalyticsStore::new(),
        failures: AtomicUsize::new(1),
    });
    let orchestrator = orchestrator(platform.clone(), store, metrics.clone());
    let (trigger, shutdown) = shutdown_channel();

    let scheduler = Scheduler::new(orchestrator, Duration::from_secs(60));
    let task = tokio::spawn(async move { scheduler.run(shutdown).await });

    tokio::time::sleep(Duration::from_secs(90)).await;
    trigger.trigger();

    assert_eq!(task.await.unwrap(), SchedulerExit::Shutdown);
    assert_eq!(metrics.snapshot().cycle_errors, 1);
    assert_eq!(platform.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_engagement_and_health_run_on_their_own_intervals() {
    let platform = Arc::new(StubPlatform::new());
    let metrics = HeraldMetrics::new().unwrap();
    let orchestrator = orchestrator(
        platform.clone(),
        Arc::new(InMemoryAnalyticsStore::new()),
        metrics.clone(),
    );
    let monitor = Arc::new(orchestrator.health_monitor());
    let (trigger, shutdown) = shutdown_channel();

    let scheduler = Scheduler::new(orchestrator, Duration::from_secs(3600))
        .with_engagement(Duration::from_secs(60))
        .with_health(monitor, Duration::from_secs(60));
    let task = tokio::spawn(async move { scheduler.run(shutdown).await });

    tokio::time::sleep(Duration::from_secs(150)).await;
    trigger.trigger();

    assert_eq!(task.await.unwrap(), SchedulerExit::Shutdown);
    // One cycle at 0s; refreshes and checks at 60s and 120s.
    assert_eq!(platform.calls(), 1);
    assert_eq!(platform.lookups(), vec![vec!["post-1".to_string()]; 2]);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.health_checks["healthy"], 2);
    assert_eq!(snapshot.engagement["impressions"], 120);
}

#[tokio::test(start_paused = true)]
async fn test_zero_intervals_disable_background_work() {
    let platform = Arc::new(StubPlatform::new());
    let metrics = HeraldMetrics::new().unwrap();
    let orchestrator = orchestrator(
        platform.clone(),
        Arc::new(InMemoryAnalyticsStore::new()),
        metrics.clone(),
    );
    let monitor = Arc::new(orchestrator.health_monitor());
    let (trigger, shutdown) = shutdown_channel();

    let scheduler = Scheduler::new(orchestrator, Duration::from_secs(3600))
        .with_engagement(Duration::ZERO)
        .with_health(monitor, Duration::ZERO);
    let task = tokio::spawn(async move { scheduler.run(shutdown).await });

    tokio::time::sleep(Duration::from_secs(150)).await;
    trigger.trigger();

    assert_eq!(task.await.unwrap(), SchedulerExit::Shutdown);
    assert!(platform.lookups().is_empty());
    assert_eq!(metrics.snapshot().health_checks["healthy"], 0);
}
