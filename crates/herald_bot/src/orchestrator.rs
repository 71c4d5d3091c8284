//! The posting cycle.
//!
//! A cycle either resumes a `queued` item claimed from the store or creates
//! new content: pick a topic, generate text and optionally an image, store
//! the item (or every part of a thread), then post with bounded retries.
//! Every outbound call goes through the [`DependencyGuard`], and every
//! cycle ends with a [`CycleRecord`] in the analytics store.
//!
//! Items are claimed for the worker that posts them, so several
//! orchestrators may share one analytics store without posting an item
//! twice.

use crate::guard::{CallError, DependencyGuard, log_retry};
use crate::{
    Admission, ContentConfig, EngagementConfig, HealthMonitor, HeraldConfig, HeraldMetrics,
    ImageConfig, ShutdownSignal, ThreadsConfig, TrendCache, TrendsConfig,
};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use herald_core::{
    AttemptOutcome, Clock, ContentItem, ContentStatus, CycleOutcome, CycleRecord, Dependency,
    EngagementSnapshot, ImageRef, PostAttempt, PostRequest, Prompt, SystemClock, TrendQuery,
    TrendSignal, sanitize_text, split_thread,
};
use herald_error::{
    ConfigError, ContentError, ContentErrorKind, DatabaseError, DatabaseErrorKind, FailureClass,
    HeraldResult,
};
use herald_interface::{
    AnalyticsStore, ContentGenerator, DependencyStateStore, ImageGenerator, SocialPlatform,
    TrendSource,
};
use herald_rate_limit::{DependencyLimitsSet, RetryPolicy};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// What a cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct CycleReport {
    /// How the cycle ended
    outcome: CycleOutcome,
    /// The item worked on, in its final state; the head part for threads
    item: Option<ContentItem>,
    /// Every part of the thread worked on, by position; empty for single posts
    thread: Vec<ContentItem>,
    /// Post attempts made during this cycle
    attempts: Vec<PostAttempt>,
    /// Dependency responsible for a non-posted outcome
    dependency: Option<Dependency>,
    /// Error text, if any
    error: Option<String>,
}

impl CycleReport {
    fn new(outcome: CycleOutcome, item: Option<ContentItem>) -> Self {
        Self {
            outcome,
            item,
            thread: Vec::new(),
            attempts: Vec::new(),
            dependency: None,
            error: None,
        }
    }

    fn for_thread(outcome: CycleOutcome, parts: Vec<ContentItem>) -> Self {
        Self {
            item: parts.first().cloned(),
            thread: parts,
            ..Self::new(outcome, None)
        }
    }

    fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependency = Some(dependency);
        self
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    fn with_attempts(mut self, attempts: Vec<PostAttempt>) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Either the value a step produced or the report that ends the cycle.
type Step<T> = Result<T, CycleReport>;

/// Failures a step may shrug off: anything short of cancellation, rejected
/// credentials or a broken store.
fn degradable(err: &CallError) -> bool {
    !matches!(
        err,
        CallError::Cancelled
            | CallError::Store(_)
            | CallError::Failed {
                class: FailureClass::Auth,
                ..
            }
    )
}

/// The outcome and message for a call that produced no value. Store
/// failures are returned as errors.
fn stop_reason(err: CallError) -> HeraldResult<(CycleOutcome, String)> {
    let message = err.to_string();
    let outcome = match err {
        CallError::CircuitOpen => CycleOutcome::Skipped,
        CallError::BudgetExhausted => CycleOutcome::Deferred,
        CallError::Cancelled => CycleOutcome::Cancelled,
        CallError::Failed { class, .. } => match class {
            FailureClass::Auth => CycleOutcome::Halted,
            FailureClass::RateLimited => CycleOutcome::Deferred,
            FailureClass::Transient | FailureClass::Permanent => CycleOutcome::Aborted,
        },
        CallError::Store(err) => return Err(err),
    };
    Ok((outcome, message))
}

/// How posting one item ended.
#[derive(Debug)]
struct Delivery {
    item: ContentItem,
    attempts: Vec<PostAttempt>,
    /// Outcome and error when the item was not posted
    stopped: Option<(CycleOutcome, String)>,
}

impl Delivery {
    fn into_report(self) -> CycleReport {
        match self.stopped {
            None => CycleReport::new(CycleOutcome::Posted, Some(self.item)).with_attempts(self.attempts),
            Some((outcome, error)) => CycleReport::new(outcome, Some(self.item))
                .with_attempts(self.attempts)
                .with_dependency(Dependency::SocialPlatform)
                .with_error(error),
        }
    }
}

/// Attempt numbering and the transient-failure tally for one item, seeded
/// from its stored history.
#[derive(Debug)]
struct AttemptLog {
    item_id: Uuid,
    last_number: u32,
    transient: u32,
    made: Vec<PostAttempt>,
}

impl AttemptLog {
    fn from_history(item_id: Uuid, history: &[PostAttempt]) -> Self {
        let transient = history
            .iter()
            .filter(|attempt| *attempt.outcome() == AttemptOutcome::TransientError)
            .count();
        Self {
            item_id,
            last_number: history
                .iter()
                .map(|attempt| *attempt.attempt_number())
                .max()
                .unwrap_or(0),
            transient: u32::try_from(transient).unwrap_or(u32::MAX),
            made: Vec::new(),
        }
    }

    fn failed(&mut self, class: FailureClass, error: String, now: DateTime<Utc>) -> PostAttempt {
        self.last_number += 1;
        if class == FailureClass::Transient {
            self.transient += 1;
        }
        let attempt = PostAttempt::failed(
            self.item_id,
            self.last_number,
            AttemptOutcome::from(class),
            error,
            now,
        );
        self.made.push(attempt.clone());
        attempt
    }

    fn succeeded(&mut self, post_id: &str, now: DateTime<Utc>) -> PostAttempt {
        self.last_number += 1;
        let attempt = PostAttempt::succeeded(self.item_id, self.last_number, post_id, now);
        self.made.push(attempt.clone());
        attempt
    }
}

/// Runs posting cycles against injected capabilities.
pub struct Orchestrator {
    generator: Arc<dyn ContentGenerator>,
    images: Option<Arc<dyn ImageGenerator>>,
    trends: Option<Arc<dyn TrendSource>>,
    platform: Arc<dyn SocialPlatform>,
    store: Arc<dyn AnalyticsStore>,
    guard: DependencyGuard,
    retry: RetryPolicy,
    content: ContentConfig,
    image_config: ImageConfig,
    trends_config: TrendsConfig,
    threads: ThreadsConfig,
    engagement: EngagementConfig,
    trend_cache: TrendCache,
    clock: Arc<dyn Clock>,
    metrics: HeraldMetrics,
    worker_id: Uuid,
    claim_lease: chrono::Duration,
    cycle_lock: Mutex<()>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("worker_id", &self.worker_id)
            .field("generator", &self.generator.provider_name())
            .field("platform", &self.platform.name())
            .field("images", &self.images.is_some())
            .field("trends", &self.trends.is_some())
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Start building an orchestrator.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// The dependency guard.
    pub fn guard(&self) -> &DependencyGuard {
        &self.guard
    }

    /// The metrics collectors.
    pub fn metrics(&self) -> &HeraldMetrics {
        &self.metrics
    }

    /// The analytics store.
    pub fn store(&self) -> &Arc<dyn AnalyticsStore> {
        &self.store
    }

    /// Identifier this orchestrator claims items under.
    pub fn worker_id(&self) -> Uuid {
        self.worker_id
    }

    /// A health monitor over this orchestrator's stores and breakers.
    pub fn health_monitor(&self) -> HealthMonitor {
        HealthMonitor::new(
            Arc::clone(&self.store),
            self.guard.clone(),
            Arc::clone(&self.clock),
            self.metrics.clone(),
        )
    }

    fn images_enabled(&self) -> bool {
        *self.image_config.enabled() && self.images.is_some()
    }

    fn trends_enabled(&self) -> bool {
        *self.trends_config.enabled() && self.trends.is_some()
    }

    fn lease_end(&self) -> DateTime<Utc> {
        self.clock
            .now()
            .checked_add_signed(self.claim_lease)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Run one posting cycle.
    ///
    /// Concurrent calls serialize on an internal lock. Outcomes such as an
    /// open circuit or a rejected post are reported, not returned as
    /// errors; an error means the store could not be read or written.
    #[instrument(skip_all, fields(worker_id = %self.worker_id))]
    pub async fn run_cycle(&self, shutdown: &ShutdownSignal) -> HeraldResult<CycleReport> {
        let _cycle = self.cycle_lock.lock().await;
        let started_at = self.clock.now();

        let claimed = self
            .store
            .claim_next_queued(self.worker_id, self.lease_end(), started_at)
            .await?;
        let report = match claimed {
            Some(item) => {
                info!(item_id = %item.id(), thread_id = ?item.thread_id(), "Resuming queued item");
                self.post_existing(item, shutdown).await?
            }
            None => self.create_and_post(shutdown).await?,
        };

        self.finish(started_at, report).await
    }

    /// Replay the posting step for one item, or for the thread it belongs to.
    ///
    /// An item that already reached `posted` or `failed` is returned
    /// unchanged and the platform is not contacted. An item claimed by
    /// another worker is skipped.
    #[instrument(skip(self, shutdown), fields(worker_id = %self.worker_id))]
    pub async fn resume(&self, item_id: Uuid, shutdown: &ShutdownSignal) -> HeraldResult<CycleReport> {
        let _cycle = self.cycle_lock.lock().await;
        let started_at = self.clock.now();

        let item = self.store.get_item(item_id).await?.ok_or_else(|| {
            DatabaseError::new(DatabaseErrorKind::NotFound(format!("content item {item_id}")))
        })?;

        if let Some(report) = self.finished(&item).await? {
            info!(status = %item.status(), "Nothing left to post");
            return Ok(report);
        }

        if !item.is_terminal()
            && !self
                .store
                .claim_item(item_id, self.worker_id, self.lease_end(), started_at)
                .await?
        {
            info!("Item claimed by another worker");
            let report = CycleReport::new(CycleOutcome::Skipped, Some(item))
                .with_error("item is claimed by another worker");
            return self.finish(started_at, report).await;
        }

        let report = self.post_existing(item, shutdown).await?;
        self.finish(started_at, report).await
    }

    /// The report for an item, or a whole thread, with nothing left to post.
    async fn finished(&self, item: &ContentItem) -> HeraldResult<Option<CycleReport>> {
        let parts = match *item.thread_id() {
            Some(thread_id) => self.store.thread_items(thread_id).await?,
            None => vec![item.clone()],
        };
        if !parts.iter().all(ContentItem::is_terminal) {
            return Ok(None);
        }

        let outcome = if parts
            .iter()
            .all(|part| *part.status() == ContentStatus::Posted)
        {
            CycleOutcome::Posted
        } else {
            CycleOutcome::Failed
        };
        let mut attempts = Vec::new();
        for part in &parts {
            attempts.extend(self.store.attempts_for(*part.id()).await?);
        }
        let report = if item.thread_id().is_some() {
            CycleReport::for_thread(outcome, parts)
        } else {
            CycleReport::new(outcome, Some(item.clone()))
        };
        Ok(Some(report.with_attempts(attempts)))
    }

    async fn finish(&self, started_at: DateTime<Utc>, report: CycleReport) -> HeraldResult<CycleReport> {
        let record = CycleRecord::new(
            started_at,
            self.clock.now(),
            report.outcome,
            report.item.as_ref().map(|item| *item.id()),
            report.dependency,
            report.error.clone(),
        );
        self.store.record_cycle(&record).await?;
        self.metrics.record_cycle(report.outcome);

        let mut held: Vec<Uuid> = report
            .item
            .iter()
            .chain(&report.thread)
            .map(|item| *item.id())
            .collect();
        held.sort_unstable();
        held.dedup();
        for item_id in held {
            self.store.release_claim(item_id, self.worker_id).await?;
        }

        info!(
            outcome = %report.outcome,
            item_id = ?report.item.as_ref().map(|item| *item.id()),
            thread_parts = report.thread.len(),
            dependency = ?report.dependency,
            attempts = report.attempts.len(),
            "Cycle finished"
        );
        Ok(report)
    }

    /// Check every dependency the cycle needs. Any open circuit skips the
    /// cycle; otherwise any spent budget defers it.
    async fn admit(
        &self,
        required: &[Dependency],
        item: Option<&ContentItem>,
    ) -> HeraldResult<Option<CycleReport>> {
        let mut exhausted = Vec::new();
        for &dependency in required {
            let admission = self.guard.check(dependency).await?;
            if admission.is_allowed() {
                continue;
            }
            match admission {
                Admission::CircuitOpen { until } => {
                    info!(%dependency, ?until, "Circuit open, skipping cycle");
                    let report = CycleReport::new(CycleOutcome::Skipped, item.cloned())
                        .with_dependency(dependency)
                        .with_error(format!("{dependency} circuit open"));
                    return Ok(Some(report));
                }
                Admission::BudgetExhausted { resets_at } => {
                    info!(%dependency, ?resets_at, "Rate budget exhausted");
                    exhausted.push(dependency);
                }
                Admission::Allowed => {}
            }
        }

        let Some(&first) = exhausted.first() else {
            return Ok(None);
        };
        for &dependency in &exhausted {
            self.metrics.record_rate_limited(dependency);
        }
        let report = CycleReport::new(CycleOutcome::Deferred, item.cloned())
            .with_dependency(first)
            .with_error(format!("{first} rate budget exhausted"));
        Ok(Some(report))
    }

    /// Turn a call failure into the report that ends the cycle.
    fn stop(
        &self,
        dependency: Dependency,
        err: CallError,
        item: Option<ContentItem>,
    ) -> HeraldResult<CycleReport> {
        let (outcome, message) = stop_reason(err)?;
        Ok(CycleReport::new(outcome, item)
            .with_dependency(dependency)
            .with_error(message))
    }

    async fn post_existing(&self, item: ContentItem, shutdown: &ShutdownSignal) -> HeraldResult<CycleReport> {
        if let Some(report) = self.admit(&[Dependency::SocialPlatform], Some(&item)).await? {
            return Ok(report);
        }
        match *item.thread_id() {
            Some(thread_id) => self.resume_thread(thread_id, shutdown).await,
            None => {
                let item = self.enqueue(item).await?;
                Ok(self.deliver(item, None, shutdown).await?.into_report())
            }
        }
    }

    /// Move a draft to `queued`; other statuses pass through.
    async fn enqueue(&self, mut item: ContentItem) -> HeraldResult<ContentItem> {
        if *item.status() == ContentStatus::Draft {
            item.mark_queued(self.clock.now())?;
            self.store.save_item(&item).await?;
        }
        Ok(item)
    }

    /// Claim every unfinished part of `thread_id` and continue the chain.
    async fn resume_thread(&self, thread_id: Uuid, shutdown: &ShutdownSignal) -> HeraldResult<CycleReport> {
        let parts = self.store.thread_items(thread_id).await?;
        let now = self.clock.now();
        let lease_until = self.lease_end();

        for part in parts.iter().filter(|part| !part.is_terminal()) {
            if !self
                .store
                .claim_item(*part.id(), self.worker_id, lease_until, now)
                .await?
            {
                info!(%thread_id, position = part.thread_position(), "Thread part claimed by another worker");
                return Ok(CycleReport::for_thread(CycleOutcome::Skipped, parts)
                    .with_error("thread is claimed by another worker"));
            }
        }

        let mut queued = Vec::with_capacity(parts.len());
        for part in parts {
            queued.push(self.enqueue(part).await?);
        }
        self.post_thread(queued, shutdown).await
    }

    /// Save a new draft, claim it and move it to `queued`.
    async fn queue_new(&self, mut item: ContentItem, lease_until: DateTime<Utc>) -> HeraldResult<ContentItem> {
        self.store.save_item(&item).await?;
        let now = self.clock.now();
        // Drafts are never handed out, so only a direct resume of this id could race.
        if !self
            .store
            .claim_item(*item.id(), self.worker_id, lease_until, now)
            .await?
        {
            warn!(item_id = %item.id(), "New item already claimed elsewhere");
        }
        item.mark_queued(now)?;
        self.store.save_item(&item).await?;
        Ok(item)
    }

    async fn create_and_post(&self, shutdown: &ShutdownSignal) -> HeraldResult<CycleReport> {
        let mut required = vec![Dependency::ContentGenerator, Dependency::SocialPlatform];
        if self.images_enabled() {
            required.push(Dependency::ImageGenerator);
        }
        if self.trends_enabled() && self.trend_cache.fresh(self.clock.now()).is_none() {
            required.push(Dependency::TrendMonitor);
        }
        if let Some(report) = self.admit(&required, None).await? {
            return Ok(report);
        }

        let topic = match self.choose_topic(shutdown).await? {
            Ok(topic) => topic,
            Err(report) => return Ok(report),
        };
        let as_thread = self.threads.active_at(self.clock.now());
        debug!(%topic, as_thread, "Topic chosen");

        let prompt = if as_thread {
            self.threads.prompt_for(&topic)
        } else {
            self.content.prompt_for(&topic)
        };
        let raw_text = match self.generate_text(prompt, shutdown).await? {
            Ok(text) => text,
            Err(report) => return Ok(report),
        };

        let image = match self.generate_image(&topic, shutdown).await? {
            Ok(image) => image,
            Err(report) => return Ok(report),
        };

        let max_chars = self
            .platform
            .max_text_length()
            .min(*self.content.max_text_length());
        let text = if as_thread {
            let mut parts = split_thread(
                &raw_text,
                *self.threads.max_parts(),
                max_chars.min(*self.threads.part_max_length()),
            );
            if parts.len() > 1 {
                return self.create_thread(parts, image, topic, shutdown).await;
            }
            debug!(parts = parts.len(), "Thread too short, posting a single item");
            parts.pop().unwrap_or_default()
        } else {
            sanitize_text(&raw_text, max_chars)
        };
        if text.is_empty() {
            let err = ContentError::new(ContentErrorKind::EmptyText);
            warn!(error = %err, "Generated text unusable");
            return Ok(CycleReport::new(CycleOutcome::Aborted, None)
                .with_dependency(Dependency::ContentGenerator)
                .with_error(err.to_string()));
        }

        let draft = ContentItem::draft(text, image, Some(topic), self.clock.now());
        let item = self.queue_new(draft, self.lease_end()).await?;
        info!(item_id = %item.id(), has_image = item.image().is_some(), "Content queued");

        Ok(self.deliver(item, None, shutdown).await?.into_report())
    }

    /// Store `parts` as one thread and post the chain. Only the head part
    /// carries the image.
    async fn create_thread(
        &self,
        parts: Vec<String>,
        image: Option<ImageRef>,
        topic: String,
        shutdown: &ShutdownSignal,
    ) -> HeraldResult<CycleReport> {
        let thread_id = Uuid::new_v4();
        let now = self.clock.now();
        let lease_until = self.lease_end();
        let mut queued = Vec::with_capacity(parts.len());
        for (position, text) in (0u32..).zip(parts) {
            let image = if position == 0 { image.clone() } else { None };
            let draft = ContentItem::draft(text, image, Some(topic.clone()), now).in_thread(thread_id, position);
            queued.push(self.queue_new(draft, lease_until).await?);
        }
        info!(%thread_id, parts = queued.len(), "Thread queued");

        self.post_thread(queued, shutdown).await
    }

    /// Post thread parts in order, each replying to the one before.
    ///
    /// Posted parts are skipped. When a part fails for good the parts after
    /// it are marked failed too; any other stop leaves them queued for a
    /// later cycle.
    #[instrument(skip_all, fields(thread_id = ?parts.first().and_then(|part| *part.thread_id())))]
    async fn post_thread(&self, parts: Vec<ContentItem>, shutdown: &ShutdownSignal) -> HeraldResult<CycleReport> {
        let mut reply_to: Option<String> = None;
        let mut attempts = Vec::new();
        let mut done = Vec::with_capacity(parts.len());
        let mut pending = parts.into_iter();

        while let Some(part) = pending.next() {
            let delivery = match *part.status() {
                ContentStatus::Posted => {
                    reply_to = part.platform_post_id().clone();
                    done.push(part);
                    continue;
                }
                ContentStatus::Failed => Delivery {
                    item: part,
                    attempts: Vec::new(),
                    stopped: Some((CycleOutcome::Failed, "an earlier thread part failed".to_string())),
                },
                _ => self.deliver(part, reply_to.as_deref(), shutdown).await?,
            };
            attempts.extend(delivery.attempts);

            let Some((outcome, error)) = delivery.stopped else {
                reply_to = delivery.item.platform_post_id().clone();
                done.push(delivery.item);
                continue;
            };

            done.push(delivery.item);
            if outcome == CycleOutcome::Failed {
                for mut rest in pending {
                    if !rest.is_terminal() {
                        rest.mark_failed(self.clock.now())?;
                        self.store.save_item(&rest).await?;
                    }
                    done.push(rest);
                }
            } else {
                done.extend(pending);
            }
            warn!(%outcome, error = %error, "Thread stopped");
            return Ok(CycleReport::for_thread(outcome, done)
                .with_attempts(attempts)
                .with_dependency(Dependency::SocialPlatform)
                .with_error(error));
        }

        info!(parts = done.len(), "Thread posted");
        Ok(CycleReport::for_thread(CycleOutcome::Posted, done).with_attempts(attempts))
    }

    async fn choose_topic(&self, shutdown: &ShutdownSignal) -> HeraldResult<Step<String>> {
        let recent: Vec<String> = self
            .store
            .recent_items(*self.content.recent_topic_window())
            .await?
            .iter()
            .filter_map(|item| item.source_trend().as_ref().map(|t| t.to_lowercase()))
            .collect();
        let used_recently = |topic: &str| recent.contains(&topic.to_lowercase());

        if self.trends_enabled() {
            match self.trend_signal(shutdown).await? {
                Ok(Some(signal)) => {
                    if let Some(topic) = signal.topics().iter().find(|t| !used_recently(t)) {
                        return Ok(Ok(topic.clone()));
                    }
                    debug!("Every trending topic was posted recently");
                }
                Ok(None) => {}
                Err(report) => return Ok(Err(report)),
            }
        }

        let fallback = self.content.fallback_topics();
        match fallback
            .iter()
            .find(|t| !used_recently(t))
            .or_else(|| fallback.first())
        {
            Some(topic) => Ok(Ok(topic.clone())),
            None => {
                info!("No topic available");
                Ok(Err(CycleReport::new(CycleOutcome::Idle, None)
                    .with_error("no trending or fallback topic available")))
            }
        }
    }

    /// Fresh cached trends, or a new lookup. `None` means use the fallback
    /// topics.
    async fn trend_signal(
        &self,
        shutdown: &ShutdownSignal,
    ) -> HeraldResult<Step<Option<TrendSignal>>> {
        if let Some(signal) = self.trend_cache.fresh(self.clock.now()) {
            debug!("Using cached trends");
            return Ok(Ok(Some(signal)));
        }
        let Some(source) = self.trends.as_ref() else {
            return Ok(Ok(None));
        };

        let query = TrendQuery::new(self.trends_config.query().clone(), *self.trends_config.limit());
        let result = self
            .guard
            .call_with_retry(Dependency::TrendMonitor, &self.retry, shutdown, || {
                source.search(&query)
            })
            .await;

        match result {
            Ok(signal) => {
                self.trend_cache.store(signal.clone(), self.clock.now());
                Ok(Ok(Some(signal)))
            }
            Err(err) if degradable(&err) => {
                warn!(error = %err, "Trend lookup failed, using fallback topics");
                Ok(Ok(None))
            }
            Err(err) => self.stop(Dependency::TrendMonitor, err, None).map(Err),
        }
    }

    async fn generate_text(&self, prompt: String, shutdown: &ShutdownSignal) -> HeraldResult<Step<String>> {
        let mut prompt = Prompt::new(prompt);
        if let Some(system) = self.content.system_prompt() {
            prompt = prompt.with_system(system.clone());
        }
        let options = self.content.generation();

        let result = self
            .guard
            .call_with_retry(Dependency::ContentGenerator, &self.retry, shutdown, || {
                self.generator.generate(&prompt, options)
            })
            .await;

        match result {
            Ok(generated) => Ok(Ok(generated.text().clone())),
            Err(err) => {
                warn!(error = %err, "Text generation failed");
                self.stop(Dependency::ContentGenerator, err, None).map(Err)
            }
        }
    }

    async fn generate_image(
        &self,
        topic: &str,
        shutdown: &ShutdownSignal,
    ) -> HeraldResult<Step<Option<ImageRef>>> {
        let Some(images) = self.images.as_ref().filter(|_| self.images_enabled()) else {
            return Ok(Ok(None));
        };

        let prompt = Prompt::new(self.image_config.prompt_for(topic));
        let result = self
            .guard
            .call_with_retry(Dependency::ImageGenerator, &self.retry, shutdown, || {
                images.generate(&prompt)
            })
            .await;

        match result {
            Ok(generated) => Ok(Ok(Some(generated.into_image()))),
            Err(err) if degradable(&err) => {
                warn!(error = %err, "Image generation failed, posting text only");
                Ok(Ok(None))
            }
            Err(err) => self.stop(Dependency::ImageGenerator, err, None).map(Err),
        }
    }

    /// Post a queued item, retrying transient failures.
    ///
    /// The retry bound covers the item's whole history: transient attempts
    /// stored by earlier cycles count against it, and a call short-circuited
    /// by an open breaker is recorded as a transient attempt. Once the bound
    /// is reached the item is marked failed.
    ///
    /// The item is saved as `posted` before its success attempt is appended,
    /// so a crash in between cannot lead to a second post.
    #[instrument(skip(self, item, shutdown), fields(item_id = %item.id()))]
    async fn deliver(
        &self,
        mut item: ContentItem,
        reply_to: Option<&str>,
        shutdown: &ShutdownSignal,
    ) -> HeraldResult<Delivery> {
        let item_id = *item.id();
        let history = self.store.attempts_for(item_id).await?;
        let log = parking_lot::Mutex::new(AttemptLog::from_history(item_id, &history));
        let max_attempts = *self.retry.max_attempts();

        let already = log.lock().transient;
        if self.retry.remaining(already) == 0 {
            warn!(transient_attempts = already, "Retry bound already reached");
            item.mark_failed(self.clock.now())?;
            self.store.save_item(&item).await?;
            return Ok(Delivery {
                item,
                attempts: Vec::new(),
                stopped: Some((
                    CycleOutcome::Failed,
                    format!("{already} transient attempts already made"),
                )),
            });
        }

        let mut request = PostRequest::new(item.text().clone());
        if let Some(post_id) = reply_to {
            request = request.with_reply_to(post_id);
        }
        if let Some(image) = item.image().clone() {
            let upload = self
                .guard
                .call_with_retry(Dependency::SocialPlatform, &self.retry, shutdown, || {
                    self.platform.upload_media(&image)
                })
                .await;
            match upload {
                Ok(media_id) => request = request.with_media(media_id),
                Err(err) if degradable(&err) => {
                    warn!(error = %err, "Media upload failed, posting text only");
                }
                Err(err) => {
                    return Ok(Delivery {
                        item,
                        attempts: Vec::new(),
                        stopped: Some(stop_reason(err)?),
                    });
                }
            }
        }

        let (log, request) = (&log, &request);
        let action = move || async move {
            let err = match self
                .guard
                .call(Dependency::SocialPlatform, shutdown, || self.platform.post(request))
                .await
            {
                Ok(receipt) => return Ok(receipt),
                Err(err) => err,
            };
            if let Some(class) = err.class() {
                let message = match &err {
                    CallError::Failed { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                let attempt = log.lock().failed(class, message, self.clock.now());
                if let Err(store) = self.store.append_attempt(&attempt).await {
                    return Err(RetryError::permanent(CallError::Store(store.into())));
                }
            }
            Err(err.into_retry())
        };

        let result = tokio::select! {
            _ = shutdown.cancelled() => Err(CallError::Cancelled),
            result = Retry::spawn_notify(self.retry.delays(already), action, log_retry) => result,
        };

        match result {
            Ok(receipt) => {
                let now = self.clock.now();
                item.mark_posted(receipt.id().clone(), now)?;
                self.store.save_item(&item).await?;
                let attempt = log.lock().succeeded(receipt.id(), now);
                self.store.append_attempt(&attempt).await?;
                info!(post_id = %receipt.id(), attempt = attempt.attempt_number(), "Posted");
                Ok(Delivery {
                    item,
                    attempts: std::mem::take(&mut log.lock().made),
                    stopped: None,
                })
            }
            Err(err) => {
                let (transient, attempts) = {
                    let mut log = log.lock();
                    (log.transient, std::mem::take(&mut log.made))
                };
                let permanent = matches!(
                    err,
                    CallError::Failed {
                        class: FailureClass::Permanent,
                        ..
                    }
                );
                let stopped = if permanent || (err.class().is_some() && transient >= max_attempts) {
                    item.mark_failed(self.clock.now())?;
                    self.store.save_item(&item).await?;
                    warn!(transient_attempts = transient, error = %err, "Item failed");
                    (CycleOutcome::Failed, err.to_string())
                } else {
                    stop_reason(err)?
                };
                Ok(Delivery {
                    item,
                    attempts,
                    stopped: Some(stopped),
                })
            }
        }
    }

    /// Fetch fresh engagement counters for posts published within the
    /// configured lookback and store one snapshot per item.
    ///
    /// Lookups are batched and guarded like any other platform call. A
    /// failed lookup ends the refresh early; snapshots stored before it
    /// are kept. An error means the store could not be read or written.
    #[instrument(skip_all, fields(worker_id = %self.worker_id))]
    pub async fn refresh_engagement(&self, shutdown: &ShutdownSignal) -> HeraldResult<Vec<EngagementSnapshot>> {
        if !*self.engagement.enabled() {
            return Ok(Vec::new());
        }
        let since = self
            .clock
            .now()
            .checked_sub_signed(self.engagement.lookback())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let published: Vec<(String, Uuid)> = self
            .store
            .posted_since(since)
            .await?
            .into_iter()
            .filter_map(|item| item.platform_post_id().clone().map(|post_id| (post_id, *item.id())))
            .collect();
        if published.is_empty() {
            debug!("No recent posts to refresh");
            return Ok(Vec::new());
        }
        let owners: HashMap<&str, Uuid> = published
            .iter()
            .map(|(post_id, item_id)| (post_id.as_str(), *item_id))
            .collect();

        let mut snapshots = Vec::with_capacity(published.len());
        for batch in published.chunks((*self.engagement.batch_size()).max(1)) {
            let ids: Vec<String> = batch.iter().map(|(post_id, _)| post_id.clone()).collect();
            let result = self
                .guard
                .call(Dependency::SocialPlatform, shutdown, || self.platform.engagement(&ids))
                .await;
            let counters = match result {
                Ok(counters) => counters,
                Err(CallError::Store(err)) => return Err(err),
                Err(err) => {
                    warn!(error = %err, refreshed = snapshots.len(), "Engagement refresh stopped");
                    break;
                }
            };

            let fetched_at = self.clock.now();
            for engagement in counters {
                let Some(&item_id) = owners.get(engagement.post_id().as_str()) else {
                    debug!(post_id = %engagement.post_id(), "Ignoring counters for unknown post");
                    continue;
                };
                let snapshot = EngagementSnapshot::new(item_id, engagement, fetched_at);
                self.store.record_engagement(&snapshot).await?;
                snapshots.push(snapshot);
            }
        }

        if !snapshots.is_empty() {
            self.metrics
                .set_engagement(snapshots.iter().map(|snapshot| snapshot.engagement()));
        }
        info!(posts = published.len(), refreshed = snapshots.len(), "Engagement refreshed");
        Ok(snapshots)
    }
}

/// Assembles an [`Orchestrator`].
///
/// A content generator, a platform, an analytics store and a dependency
/// state store are required. Configuration defaults to
/// [`HeraldConfig::default`] and the clock to [`SystemClock`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    generator: Option<Arc<dyn ContentGenerator>>,
    images: Option<Arc<dyn ImageGenerator>>,
    trends: Option<Arc<dyn TrendSource>>,
    platform: Option<Arc<dyn SocialPlatform>>,
    analytics: Option<Arc<dyn AnalyticsStore>>,
    state_store: Option<Arc<dyn DependencyStateStore>>,
    clock: Option<Arc<dyn Clock>>,
    metrics: Option<HeraldMetrics>,
    config: Option<HeraldConfig>,
}

impl OrchestratorBuilder {
    /// Text generator.
    pub fn generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Image generator, used when `image.enabled` is set.
    pub fn image_generator(mut self, images: Arc<dyn ImageGenerator>) -> Self {
        self.images = Some(images);
        self
    }

    /// Trend source, used when `trends.enabled` is set.
    pub fn trend_source(mut self, trends: Arc<dyn TrendSource>) -> Self {
        self.trends = Some(trends);
        self
    }

    /// Social platform.
    pub fn platform(mut self, platform: Arc<dyn SocialPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Analytics store.
    pub fn analytics(mut self, analytics: Arc<dyn AnalyticsStore>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// Store for budgets and breakers.
    pub fn state_store(mut self, state_store: Arc<dyn DependencyStateStore>) -> Self {
        self.state_store = Some(state_store);
        self
    }

    /// Time source for windows and cool-downs.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Metrics collectors to update.
    pub fn metrics(mut self, metrics: HeraldMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Bot configuration.
    pub fn config(mut self, config: HeraldConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a required capability is missing,
    /// or when images or trends are enabled without a provider.
    pub fn build(self) -> HeraldResult<Orchestrator> {
        let config = self.config.unwrap_or_default();
        let generator = self
            .generator
            .ok_or_else(|| ConfigError::new("orchestrator needs a content generator"))?;
        let platform = self
            .platform
            .ok_or_else(|| ConfigError::new("orchestrator needs a social platform"))?;
        let store = self
            .analytics
            .ok_or_else(|| ConfigError::new("orchestrator needs an analytics store"))?;
        let state_store = self
            .state_store
            .ok_or_else(|| ConfigError::new("orchestrator needs a dependency state store"))?;

        if *config.image().enabled() && self.images.is_none() {
            return Err(ConfigError::new("image.enabled is set but no image generator was provided").into());
        }
        if *config.trends().enabled() && self.trends.is_none() {
            return Err(ConfigError::new("trends.enabled is set but no trend source was provided").into());
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => HeraldMetrics::new()?,
        };
        let limits: DependencyLimitsSet = config.dependencies().clone();
        let guard = DependencyGuard::new(state_store, limits, Arc::clone(&clock), metrics.clone());

        Ok(Orchestrator {
            generator,
            images: self.images,
            trends: self.trends,
            platform,
            store,
            guard,
            retry: config.retry().policy(),
            content: config.content().clone(),
            image_config: config.image().clone(),
            trend_cache: TrendCache::new(config.trends().cache_ttl()),
            trends_config: config.trends().clone(),
            threads: config.threads().clone(),
            engagement: config.engagement().clone(),
            clock,
            metrics,
            worker_id: Uuid::new_v4(),
            claim_lease: chrono::Duration::from_std(config.claim_lease())
                .unwrap_or_else(|_| chrono::Duration::days(1)),
            cycle_lock: Mutex::new(()),
        })
    }
}
