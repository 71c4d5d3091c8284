//! Bot configuration and credential loading.
//!
//! Configuration is layered with the `config` crate. Later sources override
//! earlier ones:
//!
//! 1. Bundled defaults (`herald.toml` shipped with the crate)
//! 2. `~/.config/herald/herald.toml`
//! 3. `./herald.toml`
//! 4. An explicit file passed with `--config`
//! 5. `HERALD__*` environment variables (`HERALD__RETRY__MAX_ATTEMPTS=5`)
//!
//! Secrets never live in the TOML files; [`Credentials`] reads them from the
//! environment after loading `.env` with `dotenvy`.

use chrono::{DateTime, Timelike, Utc};
use config::{Config, Environment, File, FileFormat};
use derive_getters::Getters;
use herald_core::GenerationOptions;
use herald_error::{ConfigError, HeraldResult};
use herald_rate_limit::{DependencyLimitsSet, RetryConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};
use typed_builder::TypedBuilder;

const DEFAULT_CONFIG: &str = include_str!("../../../herald.toml");

/// Placeholder replaced with the chosen topic in prompt templates.
pub const TOPIC_PLACEHOLDER: &str = "{topic}";

/// Text generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, TypedBuilder)]
pub struct ContentConfig {
    /// Prompt sent to the text generator; `{topic}` is substituted.
    #[builder(default = default_prompt_template(), setter(into))]
    #[serde(default = "default_prompt_template")]
    prompt_template: String,

    /// Optional system prompt.
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    system_prompt: Option<String>,

    /// Model requested from the text generator.
    #[builder(default = default_model(), setter(into))]
    #[serde(default = "default_model")]
    model: String,

    /// Topics used when trends are disabled or unavailable.
    #[builder(default = default_fallback_topics())]
    #[serde(default = "default_fallback_topics")]
    fallback_topics: Vec<String>,

    /// Upper bound on post length; the platform's own limit also applies.
    #[builder(default = 280)]
    #[serde(default = "default_max_text_length")]
    max_text_length: usize,

    /// How many recent items to compare topics against.
    #[builder(default = 5)]
    #[serde(default = "default_recent_topic_window")]
    recent_topic_window: usize,

    /// Sampling options for the text generator.
    #[builder(default)]
    #[serde(default)]
    generation: GenerationOptions,
}

fn default_prompt_template() -> String {
    "Create a complete, natural post about {topic}. Share one clear, interesting fact \
     or insight in simple, everyday language, and end with a complete sentence."
        .to_string()
}

fn default_model() -> String {
    "grok-beta".to_string()
}

fn default_fallback_topics() -> Vec<String> {
    ["technology", "science", "space exploration"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_text_length() -> usize {
    280
}

fn default_recent_topic_window() -> usize {
    5
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ContentConfig {
    /// The prompt text for `topic`.
    pub fn prompt_for(&self, topic: &str) -> String {
        self.prompt_template.replace(TOPIC_PLACEHOLDER, topic)
    }
}

/// Image generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, TypedBuilder)]
pub struct ImageConfig {
    /// Attach a generated image to each post.
    #[builder(default = false)]
    #[serde(default)]
    enabled: bool,

    /// Image generation endpoint.
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    endpoint: Option<String>,

    /// Prompt sent to the image generator; `{topic}` is substituted.
    #[builder(default = default_image_prompt_template(), setter(into))]
    #[serde(default = "default_image_prompt_template")]
    prompt_template: String,
}

fn default_image_prompt_template() -> String {
    "A vivid, eye-catching illustration about {topic}. No text or lettering.".to_string()
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ImageConfig {
    /// The image prompt for `topic`.
    pub fn prompt_for(&self, topic: &str) -> String {
        self.prompt_template.replace(TOPIC_PLACEHOLDER, topic)
    }
}

/// Trend monitoring settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, TypedBuilder)]
pub struct TrendsConfig {
    /// Pick topics from the trend monitor.
    #[builder(default = true)]
    #[serde(default = "default_true")]
    enabled: bool,

    /// Search terms sent to the trend monitor.
    #[builder(default = default_trend_query(), setter(into))]
    #[serde(default = "default_trend_query")]
    query: String,

    /// Maximum topics requested.
    #[builder(default = 5)]
    #[serde(default = "default_trend_limit")]
    limit: usize,

    /// How long a fetched signal stays fresh.
    #[builder(default = 3600)]
    #[serde(default = "default_cache_ttl_seconds")]
    cache_ttl_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_trend_query() -> String {
    "technology".to_string()
}

fn default_trend_limit() -> usize {
    5
}

fn default_cache_ttl_seconds() -> u64 {
    3600
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TrendsConfig {
    /// Cache lifetime.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

/// Thread posting settings.
///
/// During the configured UTC hours a cycle asks for a short thread instead
/// of a single post. Each line of the generated text becomes one part; the
/// parts are posted as a reply chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, TypedBuilder)]
pub struct ThreadsConfig {
    /// Post threads during `hours`.
    #[builder(default = false)]
    #[serde(default)]
    enabled: bool,

    /// UTC hours (0-23) in which cycles post threads.
    #[builder(default = default_thread_hours())]
    #[serde(default = "default_thread_hours")]
    hours: Vec<u32>,

    /// Most parts kept from one generated thread.
    #[builder(default = 4)]
    #[serde(default = "default_thread_max_parts")]
    max_parts: usize,

    /// Upper bound on each part's length.
    #[builder(default = 140)]
    #[serde(default = "default_thread_part_length")]
    part_max_length: usize,

    /// Prompt sent to the text generator; `{topic}` is substituted.
    #[builder(default = default_thread_prompt_template(), setter(into))]
    #[serde(default = "default_thread_prompt_template")]
    prompt_template: String,
}

fn default_thread_hours() -> Vec<u32> {
    vec![0, 1, 2, 3, 6, 7, 8, 9]
}

fn default_thread_max_parts() -> usize {
    4
}

fn default_thread_part_length() -> usize {
    140
}

fn default_thread_prompt_template() -> String {
    "Create a natural, educational thread about {topic}. Write 3-4 posts, one per line, \
     each under 140 characters and a complete thought. Start with an interesting fact or \
     question, build knowledge step by step and end with a meaningful conclusion."
        .to_string()
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ThreadsConfig {
    /// Whether a cycle starting at `now` should post a thread.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use herald_bot::ThreadsConfig;
    ///
    /// let threads = ThreadsConfig::builder().enabled(true).build();
    /// assert!(threads.active_at(Utc.with_ymd_and_hms(2026, 10, 18, 7, 30, 0).unwrap()));
    /// assert!(!threads.active_at(Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()));
    /// ```
    pub fn active_at(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.hours.contains(&now.hour())
    }

    /// The thread prompt for `topic`.
    pub fn prompt_for(&self, topic: &str) -> String {
        self.prompt_template.replace(TOPIC_PLACEHOLDER, topic)
    }
}

/// Engagement refresh settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, TypedBuilder)]
pub struct EngagementConfig {
    /// Refresh counters for recent posts.
    #[builder(default = true)]
    #[serde(default = "default_true")]
    enabled: bool,

    /// Minutes between refreshes.
    #[builder(default = 60)]
    #[serde(default = "default_engagement_interval_minutes")]
    interval_minutes: u64,

    /// Posts published within this many hours are refreshed.
    #[builder(default = 24)]
    #[serde(default = "default_lookback_hours")]
    lookback_hours: u64,

    /// Posts looked up per platform request.
    #[builder(default = 100)]
    #[serde(default = "default_engagement_batch_size")]
    batch_size: usize,
}

fn default_engagement_interval_minutes() -> u64 {
    60
}

fn default_lookback_hours() -> u64 {
    24
}

fn default_engagement_batch_size() -> usize {
    100
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl EngagementConfig {
    /// Interval between refreshes.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    /// How far back published posts are refreshed.
    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::try_from(self.lookback_hours).unwrap_or(i64::MAX / 3600))
    }
}

/// Health check settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, TypedBuilder)]
pub struct HealthConfig {
    /// Run the health check periodically.
    #[builder(default = true)]
    #[serde(default = "default_true")]
    enabled: bool,

    /// Minutes between checks.
    #[builder(default = 15)]
    #[serde(default = "default_health_interval_minutes")]
    interval_minutes: u64,
}

fn default_health_interval_minutes() -> u64 {
    15
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HealthConfig {
    /// Interval between checks.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

/// Metrics API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, TypedBuilder)]
pub struct ApiConfig {
    /// Serve `/health` and `/metrics`.
    #[builder(default = true)]
    #[serde(default = "default_true")]
    enabled: bool,

    /// Listen address.
    #[builder(default = default_bind(), setter(into))]
    #[serde(default = "default_bind")]
    bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:9464".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, TypedBuilder)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; `DATABASE_URL` takes precedence. Unset means in-memory.
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    url: Option<String>,

    /// Connection pool size.
    #[builder(default = 5)]
    #[serde(default = "default_pool_size")]
    pool_size: u32,
}

fn default_pool_size() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Complete bot configuration.
///
/// # Example
///
/// ```
/// use herald_bot::HeraldConfig;
///
/// let config = HeraldConfig::from_toml_str("cycle_interval_minutes = 30").unwrap();
/// assert_eq!(*config.cycle_interval_minutes(), 30);
/// assert_eq!(*config.retry().max_attempts(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, TypedBuilder)]
pub struct HeraldConfig {
    /// Minutes between posting cycles.
    #[builder(default = 360)]
    #[serde(default = "default_cycle_interval_minutes")]
    cycle_interval_minutes: u64,

    /// How long a worker's claim on a queued item lasts, in seconds.
    #[builder(default = 900)]
    #[serde(default = "default_claim_lease_seconds")]
    claim_lease_seconds: u64,

    /// Per-dependency budgets, timeouts and breaker thresholds.
    #[builder(default)]
    #[serde(default)]
    dependencies: DependencyLimitsSet,

    /// Retry schedule for transient failures.
    #[builder(default)]
    #[serde(default)]
    retry: RetryConfig,

    /// Text generation.
    #[builder(default)]
    #[serde(default)]
    content: ContentConfig,

    /// Image generation.
    #[builder(default)]
    #[serde(default)]
    image: ImageConfig,

    /// Trend monitoring.
    #[builder(default)]
    #[serde(default)]
    trends: TrendsConfig,

    /// Thread posting.
    #[builder(default)]
    #[serde(default)]
    threads: ThreadsConfig,

    /// Engagement refresh.
    #[builder(default)]
    #[serde(default)]
    engagement: EngagementConfig,

    /// Periodic health check.
    #[builder(default)]
    #[serde(default)]
    health: HealthConfig,

    /// Metrics API.
    #[builder(default)]
    #[serde(default)]
    api: ApiConfig,

    /// Storage.
    #[builder(default)]
    #[serde(default)]
    database: DatabaseConfig,
}

fn default_cycle_interval_minutes() -> u64 {
    360
}

fn default_claim_lease_seconds() -> u64 {
    900
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HeraldConfig {
    /// Load every layer, reading overrides from the process environment.
    #[instrument]
    pub fn load(explicit: Option<&Path>) -> HeraldResult<Self> {
        Self::load_layers(explicit, Environment::with_prefix("HERALD"))
    }

    /// Load every layer, reading overrides from `vars` instead of the
    /// process environment.
    pub fn load_with_env(explicit: Option<&Path>, vars: HashMap<String, String>) -> HeraldResult<Self> {
        Self::load_layers(explicit, Environment::with_prefix("HERALD").source(Some(vars)))
    }

    fn load_layers(explicit: Option<&Path>, env: Environment) -> HeraldResult<Self> {
        debug!("Loading configuration: env > --config > ./herald.toml > home > bundled");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/herald/herald.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("herald").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(env.separator("__").try_parsing(true));

        Self::finish(builder)
    }

    /// Parse one TOML document; absent keys take their defaults.
    pub fn from_toml_str(toml: &str) -> HeraldResult<Self> {
        Self::finish(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> HeraldResult<Self> {
        let config = builder
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
        Ok(config)
    }

    /// Interval between cycles.
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_minutes.saturating_mul(60))
    }

    /// Lifetime of a claim on a queued item.
    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_seconds)
    }

    /// Human-readable problems with this configuration.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.cycle_interval_minutes == 0 {
            warnings.push("cycle_interval_minutes is 0, cycles will run back to back".to_string());
        }

        warnings.extend(self.dependencies.validate());
        warnings.extend(self.retry.validate());

        if !self.content.prompt_template.contains(TOPIC_PLACEHOLDER) {
            warnings.push("content.prompt_template has no {topic} placeholder".to_string());
        }
        if self.content.fallback_topics.is_empty() {
            warnings.push(
                "content.fallback_topics is empty, cycles go idle when trends are unavailable"
                    .to_string(),
            );
        }
        if self.content.max_text_length == 0 {
            warnings.push("content.max_text_length is 0, every post will be empty".to_string());
        }

        if self.image.enabled && self.image.endpoint.is_none() {
            warnings.push("image.enabled is set but image.endpoint is missing".to_string());
        }

        if self.claim_lease_seconds == 0 {
            warnings.push("claim_lease_seconds is 0, claims expire immediately".to_string());
        }

        if self.threads.enabled {
            if let Some(hour) = self.threads.hours.iter().find(|hour| **hour > 23) {
                warnings.push(format!("threads.hours contains {hour}, hours run 0-23"));
            }
            if self.threads.max_parts < 2 {
                warnings.push("threads.max_parts is below 2, threads post as single items".to_string());
            }
            if !self.threads.prompt_template.contains(TOPIC_PLACEHOLDER) {
                warnings.push("threads.prompt_template has no {topic} placeholder".to_string());
            }
        }

        if self.engagement.enabled && self.engagement.interval_minutes == 0 {
            warnings.push("engagement.interval_minutes is 0, engagement refresh is disabled".to_string());
        }
        if self.engagement.batch_size == 0 {
            warnings.push("engagement.batch_size is 0, treated as 1".to_string());
        }
        if self.health.enabled && self.health.interval_minutes == 0 {
            warnings.push("health.interval_minutes is 0, periodic health checks are disabled".to_string());
        }

        if self.trends.enabled && self.trends.cache_ttl_seconds == 0 {
            warnings.push("trends.cache_ttl_seconds is 0, trends are fetched every cycle".to_string());
        }

        if self.api.enabled && self.api.bind.parse::<std::net::SocketAddr>().is_err() {
            warnings.push(format!("api.bind '{}' is not a socket address", self.api.bind));
        }

        warnings
    }
}

/// API keys and tokens read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, TypedBuilder)]
pub struct Credentials {
    /// `GROK_API_KEY`
    #[builder(default, setter(strip_option, into))]
    grok_api_key: Option<String>,
    /// `MODAL_API_KEY`
    #[builder(default, setter(strip_option, into))]
    modal_api_key: Option<String>,
    /// `SERPAPI_API_KEY`
    #[builder(default, setter(strip_option, into))]
    serpapi_api_key: Option<String>,
    /// `X_USER_ACCESS_TOKEN`
    #[builder(default, setter(strip_option, into))]
    x_user_access_token: Option<String>,
    /// `DATABASE_URL`
    #[builder(default, setter(strip_option, into))]
    database_url: Option<String>,
}

impl Credentials {
    /// Load `.env` if present, then read credentials from the environment.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through `lookup`, treating blank values as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            grok_api_key: read("GROK_API_KEY"),
            modal_api_key: read("MODAL_API_KEY"),
            serpapi_api_key: read("SERPAPI_API_KEY"),
            x_user_access_token: read("X_USER_ACCESS_TOKEN"),
            database_url: read("DATABASE_URL"),
        }
    }

    /// Missing credentials that `config` needs.
    ///
    /// `dry_run` skips the platform token.
    pub fn missing(&self, config: &HeraldConfig, dry_run: bool) -> Vec<String> {
        let mut missing = Vec::new();
        if self.grok_api_key.is_none() {
            missing.push("GROK_API_KEY is not set".to_string());
        }
        if !dry_run && self.x_user_access_token.is_none() {
            missing.push("X_USER_ACCESS_TOKEN is not set".to_string());
        }
        if *config.image().enabled() && self.modal_api_key.is_none() {
            missing.push("MODAL_API_KEY is not set but image.enabled is true".to_string());
        }
        if *config.trends().enabled() && self.serpapi_api_key.is_none() {
            missing.push("SERPAPI_API_KEY is not set but trends.enabled is true".to_string());
        }
        missing
    }
}
