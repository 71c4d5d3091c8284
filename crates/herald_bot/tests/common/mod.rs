//! Scripted capability stubs shared by the orchestrator tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use herald_bot::{HeraldConfig, HeraldMetrics, Orchestrator, TrendsConfig};
use herald_core::{
    GeneratedImage, GeneratedText, GenerationOptions, ImageRef, ManualClock, PostEngagement,
    PostReceipt, PostRequest, Prompt, TrendQuery, TrendSignal,
};
use herald_database::{InMemoryAnalyticsStore, InMemoryDependencyStateStore};
use herald_error::{GenerationError, GenerationErrorKind, PlatformError, PlatformErrorKind};
use herald_interface::{ContentGenerator, ImageGenerator, SocialPlatform, TrendSource};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Pops scripted replies, repeating `fallback` once the script runs out.
#[derive(Debug)]
struct Script<R> {
    replies: Mutex<VecDeque<R>>,
    fallback: R,
}

impl<R: Clone> Script<R> {
    fn new(fallback: R) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback,
        }
    }

    fn push(&self, reply: R) {
        self.replies.lock().push_back(reply);
    }

    fn next(&self) -> R {
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Never resolves; the guard's timeout fires instead.
async fn hang() {
    std::future::pending::<()>().await
}

#[derive(Debug, Clone)]
pub enum TextReply {
    Text(String),
    Fail(GenerationErrorKind),
    Hang,
}

#[derive(Debug)]
pub struct StubGenerator {
    script: Script<TextReply>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn new() -> Self {
        Self {
            script: Script::new(TextReply::Text("Rust ships a new release today.".into())),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(kind: GenerationErrorKind) -> Self {
        Self {
            script: Script::new(TextReply::Fail(kind)),
            ..Self::new()
        }
    }

    pub fn push(&self, reply: TextReply) {
        self.script.push(reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ContentGenerator for StubGenerator {
    async fn generate(
        &self,
        prompt: &Prompt,
        _options: &GenerationOptions,
    ) -> Result<GeneratedText, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.text().clone());
        match self.script.next() {
            TextReply::Text(text) => Ok(GeneratedText::new(text, Some("stub".into()))),
            TextReply::Fail(kind) => Err(GenerationError::new(kind)),
            TextReply::Hang => {
                hang().await;
                unreachable!()
            }
        }
    }

    fn provider_name(&self) -> &str {
        "stub"
    }
}

#[derive(Debug)]
pub struct StubImages {
    fail: Option<GenerationErrorKind>,
    calls: AtomicUsize,
}

impl StubImages {
    pub fn new() -> Self {
        Self {
            fail: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: GenerationErrorKind) -> Self {
        Self {
            fail: Some(kind),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for StubImages {
    async fn generate(&self, _prompt: &Prompt) -> Result<GeneratedImage, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail {
            Some(kind) => Err(GenerationError::new(kind.clone())),
            None => Ok(GeneratedImage::new(ImageRef::new(
                "https://images.test/flux.png",
                None,
            ))),
        }
    }

    fn provider_name(&self) -> &str {
        "stub-images"
    }
}

#[derive(Debug)]
pub struct StubTrends {
    script: Script<Result<Vec<String>, GenerationErrorKind>>,
    calls: AtomicUsize,
}

impl StubTrends {
    pub fn new(topics: &[&str]) -> Self {
        Self {
            script: Script::new(Ok(topics.iter().map(|t| t.to_string()).collect())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: GenerationErrorKind) -> Self {
        Self {
            script: Script::new(Err(kind)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrendSource for StubTrends {
    async fn search(&self, _query: &TrendQuery) -> Result<TrendSignal, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .next()
            .map(|topics| TrendSignal::new(topics, Utc::now()))
            .map_err(GenerationError::new)
    }

    fn provider_name(&self) -> &str {
        "stub-trends"
    }
}

#[derive(Debug, Clone)]
pub enum PostReply {
    Posted,
    Fail(PlatformErrorKind),
    Hang,
}

#[derive(Debug)]
pub struct StubPlatform {
    script: Script<PostReply>,
    upload_fail: Option<PlatformErrorKind>,
    posts: Mutex<Vec<(PostRequest, Instant)>>,
    uploads: AtomicUsize,
    max_text_length: usize,
    gate: Option<Arc<Notify>>,
    lookup_fail: Option<PlatformErrorKind>,
    lookups: Mutex<Vec<Vec<String>>>,
}

impl StubPlatform {
    pub fn new() -> Self {
        Self {
            script: Script::new(PostReply::Posted),
            upload_fail: None,
            posts: Mutex::new(Vec::new()),
            uploads: AtomicUsize::new(0),
            max_text_length: 280,
            gate: None,
            lookup_fail: None,
            lookups: Mutex::new(Vec::new()),
        }
    }

    /// Every post waits for `gate` to be notified before answering.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn failing_lookups(kind: PlatformErrorKind) -> Self {
        Self {
            lookup_fail: Some(kind),
            ..Self::new()
        }
    }

    pub fn with_fallback(reply: PostReply) -> Self {
        Self {
            script: Script::new(reply),
            ..Self::new()
        }
    }

    pub fn failing_uploads(kind: PlatformErrorKind) -> Self {
        Self {
            upload_fail: Some(kind),
            ..Self::new()
        }
    }

    pub fn with_max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }

    pub fn push(&self, reply: PostReply) {
        self.script.push(reply);
    }

    /// Every post call, including failed ones.
    pub fn calls(&self) -> usize {
        self.posts.lock().len()
    }

    pub fn requests(&self) -> Vec<PostRequest> {
        self.posts.lock().iter().map(|(r, _)| r.clone()).collect()
    }

    /// Offsets of each post call from `start`.
    pub fn call_offsets(&self, start: Instant) -> Vec<Duration> {
        self.posts
            .lock()
            .iter()
            .map(|(_, at)| at.duration_since(start))
            .collect()
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Post ids asked for by each engagement lookup.
    pub fn lookups(&self) -> Vec<Vec<String>> {
        self.lookups.lock().clone()
    }
}

/// Counters the stub reports for every looked-up post.
pub fn stub_engagement(post_id: &str) -> PostEngagement {
    PostEngagement::new(post_id, 120, 7, 3, 2)
}

#[async_trait]
impl SocialPlatform for StubPlatform {
    async fn post(&self, request: &PostRequest) -> Result<PostReceipt, PlatformError> {
        let n = {
            let mut posts = self.posts.lock();
            posts.push((request.clone(), Instant::now()));
            posts.len()
        };
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.script.next() {
            PostReply::Posted => Ok(PostReceipt::new(format!("post-{n}"), Utc::now())),
            PostReply::Fail(kind) => Err(PlatformError::new(kind)),
            PostReply::Hang => {
                hang().await;
                unreachable!()
            }
        }
    }

    async fn upload_media(&self, _image: &ImageRef) -> Result<String, PlatformError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        match &self.upload_fail {
            Some(kind) => Err(PlatformError::new(kind.clone())),
            None => Ok("media-1".into()),
        }
    }

    async fn engagement(&self, post_ids: &[String]) -> Result<Vec<PostEngagement>, PlatformError> {
        self.lookups.lock().push(post_ids.to_vec());
        match &self.lookup_fail {
            Some(kind) => Err(PlatformError::new(kind.clone())),
            None => Ok(post_ids.iter().map(|id| stub_engagement(id)).collect()),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }

    fn max_text_length(&self) -> usize {
        self.max_text_length
    }
}

/// Config with trends and images off, so only text and posting are called.
pub fn text_only_config() -> HeraldConfig {
    HeraldConfig::builder()
        .trends(TrendsConfig::builder().enabled(false).build())
        .build()
}

/// An orchestrator over stubs, with handles to inspect afterwards.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub generator: Arc<StubGenerator>,
    pub platform: Arc<StubPlatform>,
    pub images: Option<Arc<StubImages>>,
    pub trends: Option<Arc<StubTrends>>,
    pub analytics: InMemoryAnalyticsStore,
    pub states: InMemoryDependencyStateStore,
    pub clock: Arc<ManualClock>,
    pub metrics: HeraldMetrics,
    pub config: HeraldConfig,
}

impl Harness {
    /// A second orchestrator, with its own worker id, over the same stubs
    /// and stores.
    pub fn sibling(&self) -> Orchestrator {
        Orchestrator::builder()
            .config(self.config.clone())
            .generator(self.generator.clone())
            .platform(self.platform.clone())
            .analytics(Arc::new(self.analytics.clone()))
            .state_store(Arc::new(self.states.clone()))
            .clock(self.clock.clone())
            .metrics(self.metrics.clone())
            .build()
            .unwrap()
    }
}

pub struct HarnessBuilder {
    config: HeraldConfig,
    generator: StubGenerator,
    platform: StubPlatform,
    images: Option<StubImages>,
    trends: Option<StubTrends>,
    analytics: InMemoryAnalyticsStore,
}

impl HarnessBuilder {
    pub fn new(config: HeraldConfig) -> Self {
        Self {
            config,
            generator: StubGenerator::new(),
            platform: StubPlatform::new(),
            images: None,
            trends: None,
            analytics: InMemoryAnalyticsStore::new(),
        }
    }

    pub fn generator(mut self, generator: StubGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn platform(mut self, platform: StubPlatform) -> Self {
        self.platform = platform;
        self
    }

    pub fn images(mut self, images: StubImages) -> Self {
        self.images = Some(images);
        self
    }

    pub fn trends(mut self, trends: StubTrends) -> Self {
        self.trends = Some(trends);
        self
    }

    pub fn analytics(mut self, analytics: InMemoryAnalyticsStore) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn build(self) -> Harness {
        let generator = Arc::new(self.generator);
        let platform = Arc::new(self.platform);
        let images = self.images.map(Arc::new);
        let trends = self.trends.map(Arc::new);
        let states = InMemoryDependencyStateStore::new();
        let clock = Arc::new(ManualClock::default());
        let metrics = HeraldMetrics::new().unwrap();

        let mut builder = Orchestrator::builder()
            .config(self.config.clone())
            .generator(generator.clone())
            .platform(platform.clone())
            .analytics(Arc::new(self.analytics.clone()))
            .state_store(Arc::new(states.clone()))
            .clock(clock.clone())
            .metrics(metrics.clone());
        if let Some(images) = &images {
            builder = builder.image_generator(images.clone());
        }
        if let Some(trends) = &trends {
            builder = builder.trend_source(trends.clone());
        }

        Harness {
            orchestrator: builder.build().unwrap(),
            generator,
            platform,
            images,
            trends,
            analytics: self.analytics,
            states,
            clock,
            metrics,
            config: self.config,
        }
    }
}

pub fn harness(config: HeraldConfig) -> Harness {
    HarnessBuilder::new(config).build()
}
