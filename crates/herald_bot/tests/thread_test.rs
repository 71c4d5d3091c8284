mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{HarnessBuilder, PostReply, StubImages, StubPlatform, TextReply};
use herald_bot::{HeraldConfig, shutdown_channel};
use herald_core::{ContentStatus, CycleOutcome, Dependency};
use herald_error::PlatformErrorKind;
use herald_interface::AnalyticsStore;

const THREAD_TEXT: &str = "Octopuses have three hearts.\n\
                           Two pump blood to the gills.\n\
                           The third serves the rest of the body.";

fn config(extra: &str) -> HeraldConfig {
    HeraldConfig::from_toml_str(&format!(
        "[trends]\nenabled = false\n[threads]\nenabled = true\nhours = [7]\n{extra}"
    ))
    .unwrap()
}

fn in_thread_hours(h: &common::Harness) {
    h.clock
        .set(Utc.with_ymd_and_hms(2026, 10, 18, 7, 0, 0).unwrap());
}

#[tokio::test]
async fn test_thread_hours_post_a_reply_chain() {
    let h = HarnessBuilder::new(config(
        "[image]\nenabled = true\nendpoint = \"http://modal.test\"",
    ))
    .images(StubImages::new())
    .build();
    h.generator.push(TextReply::Text(THREAD_TEXT.into()));
    in_thread_hours(&h);
    let (_trigger, shutdown) = shutdown_channel();

    let report = h.orchestrator.run_cycle(&shutdown).await.unwrap();

    assert_eq!(*report.outcome(), CycleOutcome::Posted);
    assert_eq!(h.generator.prompts()[0], h.config.threads().prompt_for("technology"));
    let parts = report.thread();
    assert_eq!(parts.len(), 3);
    assert_eq!(report.item().as_ref(), parts.first());
    let thread_id = parts[0].thread_id().unwrap();
    for (position, part) in (0u32..).zip(parts) {
        assert_eq!(*part.thread_id(), Some(thread_id));
        assert_eq!(*part.thread_position(), position);
        assert_eq!(*part.status(), ContentStatus::Posted);
    }
    assert_eq!(parts[1].text(), "Two pump blood to the gills.");
    assert!(parts[0].image().is_some());
    assert!(parts[1].image().is_none() && parts[2].image().is_none());

    let requests = h.platform.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(*requests[0].in_reply_to(), None);
    assert_eq!(requests[0].media_ids(), &vec!["media-1".to_string()]);
    assert_eq!(requests[1].in_reply_to().as_deref(), Some("post-1"));
    assert!(requests[1].media_ids().is_empty());
    assert_eq!(requests[2].in_reply_to().as_deref(), Some("post-2"));
    assert_eq!(h.platform.uploads(), 1);
    assert_eq!(report.attempts().len(), 3);

    let stored = h.analytics.thread_items(thread_id).await.unwrap();
    assert_eq!(stored, *parts);
}

#[tokio::test]
async fn test_outside_thread_hours_posts_single_item() {
    let h = HarnessBuilder::new(config("")).build();
    h.generator.push(TextReply::Text(THREAD_TEXT.into()));
    h.clock
        .set(Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap());
    let (_trigger, shutdown) = shutdown_channel();

    let report = h.orchestrator.run_cycle(&shutdown).await.unwrap();

    assert_eq!(*report.outcome(), CycleOutcome::Posted);
    assert!(report.thread().is_empty());
    assert_eq!(*report.item().as_ref().unwrap().thread_id(), None);
    assert_eq!(h.generator.prompts()[0], h.config.content().prompt_for("technology"));
    assert_eq!(h.platform.calls(), 1);
}

#[tokio::test]
async fn test_one_line_thread_posts_single_item() {
    let h = HarnessBuilder::new(config("")).build();
    h.generator.push(TextReply::Text("Just one thought".into()));
    in_thread_hours(&h);
    let (_trigger, shutdown) = shutdown_channel();

    let report = h.orchestrator.run_cycle(&shutdown).await.unwrap();

    assert_eq!(*report.outcome(), CycleOutcome::Posted);
    assert!(report.thread().is_empty());
    let item = report.item().clone().unwrap();
    assert_eq!(item.text(), "Just one thought.");
    assert_eq!(*item.thread_id(), None);
}

#[tokio::test]
async fn test_throttled_thread_continues_where_it_stopped() {
    let platform = StubPlatform::new();
    platform.push(PostReply::Posted);
    platform.push(PostReply::Fail(PlatformErrorKind::RateLimited(
        "429 Too Many Requests".into(),
    )));
    let h = HarnessBuilder::new(config("")).platform(platform).build();
    h.generator.push(TextReply::Text(THREAD_TEXT.into()));
    in_thread_hours(&h);
    let (_trigger, shutdown) = shutdown_channel();

    let first = h.orchestrator.run_cycle(&shutdown).await.unwrap();

    assert_eq!(*first.outcome(), CycleOutcome::Deferred);
    assert_eq!(*first.dependency(), Some(Dependency::SocialPlatform));
    let statuses: Vec<ContentStatus> = first.thread().iter().map(|p| *p.status()).collect();
    assert_eq!(
        statuses,
        vec![ContentStatus::Posted, ContentStatus::Queued, ContentStatus::Queued]
    );

    h.clock.advance(Duration::seconds(901));
    let second = h.orchestrator.run_cycle(&shutdown).await.unwrap();

    assert_eq!(*second.outcome(), CycleOutcome::Posted);
    assert_eq!(second.thread().len(), 3);
    assert!(second.thread().iter().all(|p| *p.status() == ContentStatus::Posted));
    assert_eq!(h.generator.calls(), 1);

    let requests = h.platform.requests();
    assert_eq!(requests.len(), 4);
    // The retried part still replies to the head; the last replies to it.
    assert_eq!(requests[2].in_reply_to().as_deref(), Some("post-1"));
    assert_eq!(requests[3].in_reply_to().as_deref(), Some("post-3"));
}

#[tokio::test]
async fn test_rejected_part_fails_the_rest_of_the_thread() {
    let platform = StubPlatform::new();
    platform.push(PostReply::Posted);
    platform.push(PostReply::Fail(PlatformErrorKind::Validation(
        "duplicate content".into(),
    )));
    let h = HarnessBuilder::new(config("")).platform(platform).build();
    h.generator.push(TextReply::Text(THREAD_TEXT.into()));
    in_thread_hours(&h);
    let (_trigger, shutdown) = shutdown_channel();

    let report = h.orchestrator.run_cycle(&shutdown).await.unwrap();

    assert_eq!(*report.outcome(), CycleOutcome::Failed);
    let statuses: Vec<ContentStatus> = report.thread().iter().map(|p| *p.status()).collect();
    assert_eq!(
        statuses,
        vec![ContentStatus::Posted, ContentStatus::Failed, ContentStatus::Failed]
    );
    assert_eq!(h.platform.calls(), 2);

    // Nothing of the thread is left to resume.
    let replay = h
        .orchestrator
        .resume(*report.thread()[2].id(), &shutdown)
        .await
        .unwrap();
    assert_eq!(*replay.outcome(), CycleOutcome::Failed);
    assert_eq!(h.platform.calls(), 2);
}
