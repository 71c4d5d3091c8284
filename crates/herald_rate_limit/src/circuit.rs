//! Three-state circuit breaker.

use crate::to_delta;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Circuit breaker phase.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CircuitPhase {
    /// Calls flow normally
    Closed,
    /// Cool-down elapsed; the next call tests the dependency
    HalfOpen,
    /// Calls are short-circuited until the cool-down deadline
    Open,
}

impl CircuitPhase {
    /// Numeric encoding exported as the `herald_circuit_state` gauge.
    pub fn gauge_value(&self) -> i64 {
        match self {
            CircuitPhase::Closed => 0,
            CircuitPhase::HalfOpen => 1,
            CircuitPhase::Open => 2,
        }
    }
}

/// Thresholds and cool-downs for one dependency's breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct CircuitPolicy {
    /// Consecutive failures that open the circuit
    failure_threshold: u32,
    /// Initial cool-down
    cooldown: Duration,
    /// Growth factor applied when a half-open trial call fails
    cooldown_multiplier: f64,
    /// Upper bound for the cool-down
    max_cooldown: Duration,
}

impl CircuitPolicy {
    /// Create a policy.
    pub fn new(
        failure_threshold: u32,
        cooldown: Duration,
        cooldown_multiplier: f64,
        max_cooldown: Duration,
    ) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            cooldown_multiplier,
            max_cooldown: max_cooldown.max(cooldown),
        }
    }

    fn grow(&self, current: Duration) -> Duration {
        let next = current.as_secs_f64() * self.cooldown_multiplier.max(1.0);
        Duration::from_secs_f64(next.min(self.max_cooldown.as_secs_f64()))
    }
}

/// Circuit breaker state for one dependency.
///
/// Transitions:
/// - closed → open after `failure_threshold` consecutive failures
/// - open → half_open once `cooldown_until` passes, checked on admission
/// - half_open → closed on success, failure count reset
/// - half_open → open on failure, cool-down grown by the multiplier
///
/// # Examples
///
/// ```
/// use chrono::{Duration as ChronoDuration, Utc};
/// use herald_rate_limit::{CircuitBreaker, CircuitPhase, CircuitPolicy};
/// use std::time::Duration;
///
/// let policy = CircuitPolicy::new(2, Duration::from_secs(60), 2.0, Duration::from_secs(600));
/// let mut breaker = CircuitBreaker::new(&policy);
/// let now = Utc::now();
///
/// breaker.record_failure(now, &policy);
/// breaker.record_failure(now, &policy);
/// assert_eq!(*breaker.phase(), CircuitPhase::Open);
/// assert!(!breaker.admit(now));
///
/// let later = now + ChronoDuration::seconds(61);
/// assert!(breaker.admit(later));
/// assert_eq!(*breaker.phase(), CircuitPhase::HalfOpen);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct CircuitBreaker {
    /// Current phase
    phase: CircuitPhase,
    /// Failures since the last success
    consecutive_failures: u32,
    /// When an open circuit may be tried again
    cooldown_until: Option<DateTime<Utc>>,
    /// Cool-down applied the next time the circuit opens
    current_cooldown: Duration,
}

impl CircuitBreaker {
    /// A closed breaker.
    pub fn new(policy: &CircuitPolicy) -> Self {
        Self::from_parts(CircuitPhase::Closed, 0, None, policy.cooldown)
    }

    /// Rebuild a breaker read back from storage.
    pub fn from_parts(
        phase: CircuitPhase,
        consecutive_failures: u32,
        cooldown_until: Option<DateTime<Utc>>,
        current_cooldown: Duration,
    ) -> Self {
        Self {
            phase,
            consecutive_failures,
            cooldown_until,
            current_cooldown,
        }
    }

    /// Whether calls are blocked at `now` without changing state.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.phase == CircuitPhase::Open && self.cooldown_until.is_none_or(|until| now < until)
    }

    /// Decide whether a call may proceed at `now`.
    ///
    /// An open circuit whose deadline passed moves to half-open and admits
    /// the trial call.
    pub fn admit(&mut self, now: DateTime<Utc>) -> bool {
        match self.phase {
            CircuitPhase::Closed | CircuitPhase::HalfOpen => true,
            CircuitPhase::Open if self.is_open_at(now) => false,
            CircuitPhase::Open => {
                debug!("Cool-down elapsed, circuit half-open");
                self.phase = CircuitPhase::HalfOpen;
                true
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&mut self, policy: &CircuitPolicy) {
        if self.phase != CircuitPhase::Closed {
            debug!(from = %self.phase, "Circuit closed after success");
        }
        self.phase = CircuitPhase::Closed;
        self.consecutive_failures = 0;
        self.cooldown_until = None;
        self.current_cooldown = policy.cooldown;
    }

    /// Record a failed call that counts toward the threshold.
    pub fn record_failure(&mut self, now: DateTime<Utc>, policy: &CircuitPolicy) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        match self.phase {
            CircuitPhase::HalfOpen => {
                self.current_cooldown = policy.grow(self.current_cooldown);
                self.open(now);
            }
            CircuitPhase::Closed if self.consecutive_failures >= policy.failure_threshold => {
                self.open(now);
            }
            CircuitPhase::Closed | CircuitPhase::Open => {}
        }
    }

    fn open(&mut self, now: DateTime<Utc>) {
        self.phase = CircuitPhase::Open;
        self.cooldown_until = now.checked_add_signed(to_delta(self.current_cooldown));
        warn!(
            failures = self.consecutive_failures,
            cooldown_secs = self.current_cooldown.as_secs(),
            "Circuit opened"
        );
    }
}
