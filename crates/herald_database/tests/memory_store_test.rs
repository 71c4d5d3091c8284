use chrono::{Duration, Utc};
use herald_core::{
    AttemptOutcome, ContentItem, ContentStatus, CycleOutcome, CycleRecord, Dependency,
    EngagementSnapshot, PostAttempt, PostEngagement,
};
use herald_database::{InMemoryAnalyticsStore, InMemoryDependencyStateStore};
use herald_error::DatabaseErrorKind;
use herald_interface::{AnalyticsStore, DependencyStateStore};
use herald_rate_limit::{DependencyLimits, DependencyState};
use std::sync::Arc;
use uuid::Uuid;

fn queued(text: &str, created_at: chrono::DateTime<Utc>) -> ContentItem {
    let mut item = ContentItem::draft(text, None, None, created_at);
    item.mark_queued(created_at).unwrap();
    item
}

#[tokio::test]
async fn test_posted_item_rejects_changes() {
    let store = InMemoryAnalyticsStore::new();
    let now = Utc::now();
    let mut item = ContentItem::draft("hello", None, None, now);
    item.mark_queued(now).unwrap();
    item.mark_posted("p-1", now).unwrap();
    store.save_item(&item).await.unwrap();

    // Re-saving the identical item is a no-op.
    store.save_item(&item).await.unwrap();

    let forged = herald_core::ContentItemBuilder::default()
        .id(*item.id())
        .text("edited")
        .created_at(now)
        .updated_at(now)
        .status(ContentStatus::Posted)
        .platform_post_id(Some("p-1".to_string()))
        .build()
        .unwrap();
    let err = store.save_item(&forged).await.unwrap_err();
    assert!(matches!(err.kind, DatabaseErrorKind::Immutable(_)));

    let stored = store.get_item(*item.id()).await.unwrap().unwrap();
    assert_eq!(stored.text(), "hello");
}

#[tokio::test]
async fn test_claim_next_queued_returns_oldest() {
    let store = InMemoryAnalyticsStore::new();
    let now = Utc::now();
    let older = queued("older", now - Duration::minutes(10));
    let newer = queued("newer", now);
    let draft = ContentItem::draft("draft", None, None, now - Duration::hours(1));

    store.save_item(&newer).await.unwrap();
    store.save_item(&older).await.unwrap();
    store.save_item(&draft).await.unwrap();

    let worker = Uuid::new_v4();
    let lease = now + Duration::minutes(15);
    let next = store.claim_next_queued(worker, lease, now).await.unwrap().unwrap();
    assert_eq!(next.id(), older.id());

    let recent = store.recent_items(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id(), newer.id());
}

#[tokio::test]
async fn test_claimed_item_is_hidden_from_other_workers_until_lease_ends() {
    let store = InMemoryAnalyticsStore::new();
    let now = Utc::now();
    let item = queued("only", now);
    store.save_item(&item).await.unwrap();

    let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
    let lease = now + Duration::minutes(15);
    assert!(store.claim_next_queued(first, lease, now).await.unwrap().is_some());
    assert!(store.claim_next_queued(second, lease, now).await.unwrap().is_none());
    assert!(!store.claim_item(*item.id(), second, lease, now).await.unwrap());

    // The holder may re-claim; a stranger's release changes nothing.
    assert!(store.claim_item(*item.id(), first, lease, now).await.unwrap());
    store.release_claim(*item.id(), second).await.unwrap();
    assert!(!store.claim_item(*item.id(), second, lease, now).await.unwrap());

    // An expired lease is up for grabs.
    let later = lease + Duration::seconds(1);
    let taken = store.claim_next_queued(second, later + Duration::minutes(15), later).await.unwrap();
    assert_eq!(taken.map(|i| *i.id()), Some(*item.id()));

    store.release_claim(*item.id(), second).await.unwrap();
    assert!(store.claim_item(*item.id(), first, lease, now).await.unwrap());
    assert!(!store.claim_item(Uuid::new_v4(), first, lease, now).await.unwrap());
}

#[tokio::test]
async fn test_thread_parts_queue_in_position_order() {
    let store = InMemoryAnalyticsStore::new();
    let now = Utc::now();
    let thread = Uuid::new_v4();
    for position in [2u32, 0, 1] {
        let item = queued(&format!("part {position}"), now).in_thread(thread, position);
        store.save_item(&item).await.unwrap();
    }

    let parts = store.thread_items(thread).await.unwrap();
    let positions: Vec<u32> = parts.iter().map(|p| *p.thread_position()).collect();
    assert_eq!(positions, vec![0, 1, 2]);

    let head = store
        .claim_next_queued(Uuid::new_v4(), now + Duration::minutes(5), now)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*head.thread_position(), 0);
}

#[tokio::test]
async fn test_posted_since_and_engagement_snapshots() {
    let store = InMemoryAnalyticsStore::new();
    let now = Utc::now();
    let mut old = queued("old", now - Duration::days(3));
    old.mark_posted("p-old", now - Duration::days(2)).unwrap();
    let mut fresh = queued("fresh", now - Duration::hours(2));
    fresh.mark_posted("p-fresh", now - Duration::hours(1)).unwrap();
    let pending = queued("pending", now);
    for item in [&old, &fresh, &pending] {
        store.save_item(item).await.unwrap();
    }

    let recent = store.posted_since(now - Duration::hours(24)).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id(), fresh.id());

    let first = EngagementSnapshot::new(*fresh.id(), PostEngagement::new("p-fresh", 10, 1, 0, 0), now);
    let second = EngagementSnapshot::new(*fresh.id(), PostEngagement::new("p-fresh", 50, 4, 2, 1), now);
    store.record_engagement(&first).await.unwrap();
    store.record_engagement(&second).await.unwrap();
    let stored = store.engagement_for(*fresh.id()).await.unwrap().unwrap();
    assert_eq!(*stored.engagement().impressions(), 50);
    assert!(store.engagement_for(*old.id()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_attempts_and_cycles_append() {
    let store = InMemoryAnalyticsStore::new();
    let now = Utc::now();
    let item = ContentItem::draft("hello", None, None, now);
    store.save_item(&item).await.unwrap();

    store
        .append_attempt(&PostAttempt::failed(
            *item.id(),
            2,
            AttemptOutcome::TransientError,
            "timeout",
            now,
        ))
        .await
        .unwrap();
    store
        .append_attempt(&PostAttempt::failed(
            *item.id(),
            1,
            AttemptOutcome::RateLimited,
            "429",
            now,
        ))
        .await
        .unwrap();

    let attempts = store.attempts_for(*item.id()).await.unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(*attempts[0].attempt_number(), 1);
    assert_eq!(store.attempt_count(), 2);

    for outcome in [CycleOutcome::Deferred, CycleOutcome::Posted] {
        store
            .record_cycle(&CycleRecord::new(now, now, outcome, None, None, None))
            .await
            .unwrap();
    }
    let cycles = store.recent_cycles(1).await.unwrap();
    assert_eq!(*cycles[0].outcome(), CycleOutcome::Posted);
}

#[tokio::test]
async fn test_compare_and_swap_rejects_stale_version() {
    let store = InMemoryDependencyStateStore::new();
    let limits = DependencyLimits::default();
    let fresh = DependencyState::new(Dependency::SocialPlatform, &limits, Utc::now());

    let written = store.compare_and_swap(&fresh).await.unwrap().unwrap();
    assert_eq!(*written.version(), 1);

    // A second writer that also read "not stored yet" loses.
    assert!(store.compare_and_swap(&fresh).await.unwrap().is_none());

    let loaded = store.load(Dependency::SocialPlatform).await.unwrap().unwrap();
    assert_eq!(*loaded.version(), 1);
    assert!(store.compare_and_swap(&loaded).await.unwrap().is_some());
    assert_eq!(store.load_all().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reservations_never_overspend() {
    let store = Arc::new(InMemoryDependencyStateStore::new());
    let limits = DependencyLimits::builder().max_calls(5).build();
    let now = Utc::now();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = Arc::clone(&store);
        let limits = limits.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let mut state = match store.load(Dependency::ContentGenerator).await.unwrap() {
                    Some(state) => state,
                    None => DependencyState::new(Dependency::ContentGenerator, &limits, now),
                };
                let granted = state.budget_mut().try_consume(now);
                if store.compare_and_swap(&state).await.unwrap().is_some() {
                    return granted;
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            granted += 1;
        }
    }
    assert_eq!(granted, 5);
    let state = store.load(Dependency::ContentGenerator).await.unwrap().unwrap();
    assert_eq!(*state.budget().calls_used(), 5);
}
