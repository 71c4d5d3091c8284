mod common;

use chrono::Duration as ChronoDuration;
use common::{HarnessBuilder, PostReply, StubGenerator, StubPlatform, TextReply};
use herald_bot::{HeraldConfig, shutdown_channel};
use herald_database::InMemoryAnalyticsStore;
use herald_core::{AttemptOutcome, ContentStatus, CycleOutcome, Dependency};
use herald_core::{ContentItem, PostAttempt};
use herald_error::{GenerationErrorKind, PlatformErrorKind};
use herald_interface::AnalyticsStore;
use herald_rate_limit::CircuitPhase;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn config(toml: &str) -> HeraldConfig {
    HeraldConfig::from_toml_str(&format!("[trends]\nenabled = false\n{toml}")).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_open_circuit_blocks_calls_until_cooldown() {
    let generator = StubGenerator::new();
    for _ in 0..3 {
        generator.push(TextReply::Fail(GenerationErrorKind::ServiceError(
            "503 Service Unavailable".into(),
        )));
    }
    let h = HarnessBuilder::new(config(
        "[dependencies.content_generator]\ncircuit_failure_threshold = 3\ncircuit_cooldown_seconds = 60",
    ))
    .generator(generator)
    .build();
    let (_trigger, shutdown) = shutdown_channel();

    let first = h.orchestrator.run_cycle(&shutdown).await.unwrap();
    assert_eq!(*first.outcome(), CycleOutcome::Aborted);
    assert_eq!(h.generator.calls(), 3);
    assert_eq!(
        h.metrics.snapshot().dependencies["content_generator"].circuit_state,
        "open"
    );

    let skipped = h.orchestrator.run_cycle(&shutdown).await.unwrap();
    assert_eq!(*skipped.outcome(), CycleOutcome::Skipped);
    assert_eq!(*skipped.dependency(), Some(Dependency::ContentGenerator));
    assert_eq!(h.generator.calls(), 3);
    assert_eq!(h.platform.calls(), 0);

    // Cool-down over: the trial call succeeds and closes the breaker.
    h.clock.advance(ChronoDuration::seconds(61));
    let recovered = h.orchestrator.run_cycle(&shutdown).await.unwrap();

    assert_eq!(*recovered.outcome(), CycleOutcome::Posted);
    assert_eq!(h.generator.calls(), 4);
    let state = h
        .orchestrator
        .guard()
        .state(Dependency::ContentGenerator)
        .await
        .unwrap();
    assert_eq!(*state.circuit().phase(), CircuitPhase::Closed);
    assert_eq!(*state.circuit().consecutive_failures(), 0);
    assert_eq!(
        h.metrics.snapshot().dependencies["content_generator"].circuit_state,
        "closed"
    );
}

#[tokio::test]
async fn test_repeated_quota_errors_open_circuit() {
    let h = HarnessBuilder::new(config(
        "[dependencies.content_generator]\nwindow_seconds = 60\ncircuit_failure_threshold = 3\ncircuit_cooldown_seconds = 3600",
    ))
    .generator(StubGenerator::failing(GenerationErrorKind::Quota(
        "429 quota exceeded".into(),
    )))
    .build();
    let (_trigger, shutdown) = shutdown_channel();

    let mut outcomes = Vec::new();
    for _ in 0..5 {
        let report = h.orchestrator.run_cycle(&shutdown).await.unwrap();
        outcomes.push(*report.outcome());
        // Each quota error spends the window; move past it.
        h.clock.advance(ChronoDuration::seconds(61));
    }

    assert_eq!(
        outcomes,
        vec![
            CycleOutcome::Deferred,
            CycleOutcome::Deferred,
            CycleOutcome::Deferred,
            CycleOutcome::Skipped,
            CycleOutcome::Skipped,
        ]
    );
    assert_eq!(h.generator.calls(), 3);
    let state = h
        .orchestrator
        .guard()
        .state(Dependency::ContentGenerator)
        .await
        .unwrap();
    assert_eq!(*state.circuit().phase(), CircuitPhase::Open);
    assert_eq!(
        h.metrics.snapshot().dependencies["content_generator"].rate_limited,
        3
    );
}

#[tokio::test]
async fn test_eleventh_call_in_window_is_deferred() {
    let h = HarnessBuilder::new(config(
        "[dependencies.content_generator]\nmax_calls = 10\nwindow_seconds = 3600",
    ))
    .build();
    let (_trigger, shutdown) = shutdown_channel();

    for _ in 0..10 {
        let report = h.orchestrator.run_cycle(&shutdown).await.unwrap();
        assert_eq!(*report.outcome(), CycleOutcome::Posted);
    }
    let report = h.orchestrator.run_cycle(&shutdown).await.unwrap();

    assert_eq!(*report.outcome(), CycleOutcome::Deferred);
    assert_eq!(*report.dependency(), Some(Dependency::ContentGenerator));
    assert_eq!(h.generator.calls(), 10);
    assert_eq!(h.platform.calls(), 10);

    let snapshot = h.metrics.snapshot();
    let generator = &snapshot.dependencies["content_generator"];
    assert_eq!(generator.rate_limited, 1);
    assert_eq!(generator.attempted, 10);

    // Local denials never count toward the breaker.
    let state = h
        .orchestrator
        .guard()
        .state(Dependency::ContentGenerator)
        .await
        .unwrap();
    assert_eq!(*state.circuit().consecutive_failures(), 0);
    assert_eq!(*state.budget().calls_used(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_platform_timeouts_back_off_then_fail() {
    let h = HarnessBuilder::new(config(
        "[retry]\nmax_attempts = 3\nbackoff_base_ms = 1000\n\
         [dependencies.social_platform]\ntimeout_seconds = 5",
    ))
    .platform(StubPlatform::with_fallback(PostReply::Hang))
    .build();
    let (_trigger, shutdown) = shutdown_channel();

    let start = Instant::now();
    let report = h.orchestrator.run_cycle(&shutdown).await.unwrap();

    assert_eq!(*report.outcome(), CycleOutcome::Failed);
    let item = report.item().clone().unwrap();
    assert_eq!(*item.status(), ContentStatus::Failed);

    let expected = [0, 6, 13].map(Duration::from_secs);
    let offsets = h.platform.call_offsets(start);
    assert_eq!(offsets.len(), 3);
    for (offset, expected) in offsets.iter().zip(expected) {
        let drift = offset.abs_diff(expected);
        assert!(
            drift < Duration::from_millis(50),
            "attempt at {offset:?}, expected {expected:?}"
        );
    }

    let attempts = h.analytics.attempts_for(*item.id()).await.unwrap();
    assert_eq!(attempts.len(), 3);
    assert!(
        attempts
            .iter()
            .all(|a| *a.outcome() == AttemptOutcome::TransientError)
    );
    assert_eq!(
        h.metrics.snapshot().dependencies["social_platform"].failed_transient,
        3
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_abandons_in_flight_post() {
    let h = Arc::new(
        HarnessBuilder::new(config(""))
            .platform(StubPlatform::with_fallback(PostReply::Hang))
            .build(),
    );
    let (trigger, shutdown) = shutdown_channel();

    let task = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.orchestrator.run_cycle(&shutdown).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    trigger.trigger();
    let report = task.await.unwrap().unwrap();

    assert_eq!(*report.outcome(), CycleOutcome::Cancelled);
    let item = report.item().clone().unwrap();
    assert_eq!(*item.status(), ContentStatus::Queued);
    assert!(report.attempts().is_empty());
    assert!(
        h.analytics
            .attempts_for(*item.id())
            .await
            .unwrap()
            .is_empty()
    );

    // Abandoned calls leave the breaker alone.
    let state = h
        .orchestrator
        .guard()
        .state(Dependency::SocialPlatform)
        .await
        .unwrap();
    assert_eq!(*state.circuit().consecutive_failures(), 0);
}

fn always_unavailable() -> StubPlatform {
    StubPlatform::with_fallback(PostReply::Fail(PlatformErrorKind::Transient(
        "503 Service Unavailable".into(),
    )))
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opening_mid_retry_counts_toward_item_bound() {
    let h = HarnessBuilder::new(config(
        "[retry]\nmax_attempts = 3\nbackoff_base_ms = 1000\n\
         [dependencies.social_platform]\ncircuit_failure_threshold = 2\ncircuit_cooldown_seconds = 60",
    ))
    .platform(always_unavailable())
    .build();
    let (_trigger, shutdown) = shutdown_channel();

    let report = h.orchestrator.run_cycle(&shutdown).await.unwrap();

    assert_eq!(*report.outcome(), CycleOutcome::Failed);
    let item = report.item().clone().unwrap();
    assert_eq!(*item.status(), ContentStatus::Failed);
    // The third attempt never reached the platform: the breaker was open.
    assert_eq!(h.platform.calls(), 2);

    let attempts = h.analytics.attempts_for(*item.id()).await.unwrap();
    let numbers: Vec<u32> = attempts.iter().map(|a| *a.attempt_number()).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert!(
        attempts
            .iter()
            .all(|a| *a.outcome() == AttemptOutcome::TransientError)
    );
    assert_eq!(attempts[2].error().as_deref(), Some("circuit open"));
}

#[tokio::test(start_paused = true)]
async fn test_transient_bound_spans_cycles() {
    let h = HarnessBuilder::new(config(
        "[retry]\nmax_attempts = 3\nbackoff_base_ms = 1000\n\
         [dependencies.social_platform]\ncircuit_failure_threshold = 1\ncircuit_cooldown_seconds = 60",
    ))
    .platform(always_unavailable())
    .build();
    let (_trigger, shutdown) = shutdown_channel();

    let first = h.orchestrator.run_cycle(&shutdown).await.unwrap();
    assert_eq!(*first.outcome(), CycleOutcome::Skipped);
    let item = first.item().clone().unwrap();
    assert_eq!(*item.status(), ContentStatus::Queued);
    assert_eq!(first.attempts().len(), 2);
    assert_eq!(h.platform.calls(), 1);

    // After the cool-down the trial call is the item's last allowed attempt.
    h.clock.advance(ChronoDuration::seconds(61));
    let second = h.orchestrator.run_cycle(&shutdown).await.unwrap();

    assert_eq!(*second.outcome(), CycleOutcome::Failed);
    assert_eq!(second.item().as_ref().unwrap().id(), item.id());
    assert_eq!(*second.item().as_ref().unwrap().status(), ContentStatus::Failed);
    assert_eq!(second.attempts().len(), 1);
    assert_eq!(h.platform.calls(), 2);
    assert_eq!(h.generator.calls(), 1);

    let attempts = h.analytics.attempts_for(*item.id()).await.unwrap();
    let numbers: Vec<u32> = attempts.iter().map(|a| *a.attempt_number()).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_item_at_transient_bound_fails_without_posting() {
    let analytics = InMemoryAnalyticsStore::new();
    let now = chrono::Utc::now();
    let mut item = ContentItem::draft("worn out", None, None, now);
    item.mark_queued(now).unwrap();
    analytics.save_item(&item).await.unwrap();
    for number in 1..=3 {
        let attempt = PostAttempt::failed(
            *item.id(),
            number,
            AttemptOutcome::TransientError,
            "503 Service Unavailable",
            now,
        );
        analytics.append_attempt(&attempt).await.unwrap();
    }
    let h = HarnessBuilder::new(config("[retry]\nmax_attempts = 3"))
        .analytics(analytics)
        .build();
    let (_trigger, shutdown) = shutdown_channel();

    let report = h.orchestrator.resume(*item.id(), &shutdown).await.unwrap();

    assert_eq!(*report.outcome(), CycleOutcome::Failed);
    assert_eq!(*report.item().as_ref().unwrap().status(), ContentStatus::Failed);
    assert!(report.attempts().is_empty());
    assert_eq!(h.platform.calls(), 0);
}
