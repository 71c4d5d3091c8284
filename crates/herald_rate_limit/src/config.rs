//! Configuration structures for rate budgets, circuit breakers and retries.
//!
//! These deserialize from the `[dependencies.*]` and `[retry]` tables of
//! `herald.toml`:
//!
//! ```toml
//! [dependencies.social_platform]
//! max_calls = 50
//! window_seconds = 900
//! timeout_seconds = 30
//! circuit_failure_threshold = 5
//! circuit_cooldown_seconds = 60
//!
//! [retry]
//! max_attempts = 3
//! backoff_base_ms = 1000
//! ```

use crate::{CircuitPolicy, RetryPolicy};
use derive_getters::Getters;
use herald_core::Dependency;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use typed_builder::TypedBuilder;

/// Limits applied to a single dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, TypedBuilder)]
pub struct DependencyLimits {
    /// Calls allowed per window.
    #[builder(default = 60)]
    #[serde(default = "default_max_calls")]
    max_calls: u32,

    /// Window length in seconds.
    #[builder(default = 3600)]
    #[serde(default = "default_window_seconds")]
    window_seconds: u64,

    /// Timeout for a single call in seconds.
    #[builder(default = 30)]
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,

    /// Consecutive failures that open the circuit.
    #[builder(default = 5)]
    #[serde(default = "default_failure_threshold")]
    circuit_failure_threshold: u32,

    /// Initial cool-down in seconds.
    #[builder(default = 60)]
    #[serde(default = "default_cooldown_seconds")]
    circuit_cooldown_seconds: u64,

    /// Cool-down growth when a half-open trial call fails.
    #[builder(default = 2.0)]
    #[serde(default = "default_cooldown_multiplier")]
    circuit_cooldown_multiplier: f64,

    /// Cool-down cap in seconds.
    #[builder(default = 3600)]
    #[serde(default = "default_max_cooldown_seconds")]
    circuit_max_cooldown_seconds: u64,
}

fn default_max_calls() -> u32 {
    60
}

fn default_window_seconds() -> u64 {
    3600
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_seconds() -> u64 {
    60
}

fn default_cooldown_multiplier() -> f64 {
    2.0
}

fn default_max_cooldown_seconds() -> u64 {
    3600
}

impl Default for DependencyLimits {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DependencyLimits {
    /// Window length.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Breaker thresholds.
    pub fn circuit_policy(&self) -> CircuitPolicy {
        CircuitPolicy::new(
            self.circuit_failure_threshold,
            Duration::from_secs(self.circuit_cooldown_seconds),
            self.circuit_cooldown_multiplier,
            Duration::from_secs(self.circuit_max_cooldown_seconds),
        )
    }

    /// Human-readable problems with these limits, prefixed by `name`.
    pub fn validate(&self, name: &str) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_calls == 0 {
            warnings.push(format!("{name}: max_calls is 0, every call will be deferred"));
        }
        if self.window_seconds == 0 {
            warnings.push(format!("{name}: window_seconds is 0, the budget never limits"));
        }
        if self.timeout_seconds == 0 {
            warnings.push(format!("{name}: timeout_seconds is 0, every call will time out"));
        }
        if self.circuit_failure_threshold == 0 {
            warnings.push(format!(
                "{name}: circuit_failure_threshold is 0, treated as 1"
            ));
        }
        if self.circuit_cooldown_multiplier.is_nan() || self.circuit_cooldown_multiplier < 1.0 {
            warnings.push(format!(
                "{name}: circuit_cooldown_multiplier {} is below 1.0, treated as 1.0",
                self.circuit_cooldown_multiplier
            ));
        }
        if self.circuit_max_cooldown_seconds < self.circuit_cooldown_seconds {
            warnings.push(format!(
                "{name}: circuit_max_cooldown_seconds is below circuit_cooldown_seconds"
            ));
        }
        warnings
    }
}

/// Limits for every dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, TypedBuilder)]
pub struct DependencyLimitsSet {
    /// Text generation service.
    #[builder(default = default_content_generator())]
    #[serde(default = "default_content_generator")]
    content_generator: DependencyLimits,

    /// Image generation service.
    #[builder(default = default_image_generator())]
    #[serde(default = "default_image_generator")]
    image_generator: DependencyLimits,

    /// Trend search service.
    #[builder(default = default_trend_monitor())]
    #[serde(default = "default_trend_monitor")]
    trend_monitor: DependencyLimits,

    /// Social platform.
    #[builder(default = default_social_platform())]
    #[serde(default = "default_social_platform")]
    social_platform: DependencyLimits,
}

fn default_content_generator() -> DependencyLimits {
    DependencyLimits::builder()
        .max_calls(60)
        .window_seconds(3600)
        .build()
}

fn default_image_generator() -> DependencyLimits {
    DependencyLimits::builder()
        .max_calls(20)
        .window_seconds(3600)
        .timeout_seconds(120)
        .build()
}

fn default_trend_monitor() -> DependencyLimits {
    DependencyLimits::builder()
        .max_calls(100)
        .window_seconds(86_400)
        .build()
}

fn default_social_platform() -> DependencyLimits {
    DependencyLimits::builder()
        .max_calls(50)
        .window_seconds(900)
        .build()
}

impl Default for DependencyLimitsSet {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DependencyLimitsSet {
    /// Limits for `dependency`.
    pub fn for_dependency(&self, dependency: Dependency) -> &DependencyLimits {
        match dependency {
            Dependency::ContentGenerator => &self.content_generator,
            Dependency::ImageGenerator => &self.image_generator,
            Dependency::TrendMonitor => &self.trend_monitor,
            Dependency::SocialPlatform => &self.social_platform,
        }
    }

    /// Validation warnings for every dependency.
    pub fn validate(&self) -> Vec<String> {
        use strum::IntoEnumIterator;

        Dependency::iter()
            .flat_map(|dependency| {
                self.for_dependency(dependency)
                    .validate(&format!("dependencies.{dependency}"))
            })
            .collect()
    }
}

/// Retry settings for transient failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, TypedBuilder)]
pub struct RetryConfig {
    /// Total attempts, the first included.
    #[builder(default = 3)]
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,

    /// Delay after the first failure in milliseconds.
    #[builder(default = 1000)]
    #[serde(default = "default_backoff_base_ms")]
    backoff_base_ms: u64,

    /// Upper bound on a single delay in milliseconds.
    #[builder(default = 60_000)]
    #[serde(default = "default_max_backoff_ms")]
    max_backoff_ms: u64,

    /// Randomize delays.
    #[builder(default = false)]
    #[serde(default)]
    jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryConfig {
    /// The retry schedule described by this configuration.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.max_backoff_ms),
            self.jitter,
        )
    }

    /// Human-readable problems with these settings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_attempts == 0 {
            warnings.push("retry.max_attempts is 0, treated as 1".to_string());
        }
        if self.max_backoff_ms < self.backoff_base_ms {
            warnings.push("retry.max_backoff_ms is below retry.backoff_base_ms".to_string());
        }
        warnings
    }
}
