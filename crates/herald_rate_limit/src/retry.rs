//! Retry schedule for transient failures.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_retry2::strategy::{ExponentialFactorBackoff, jitter};

/// Bounded exponential backoff.
///
/// `max_attempts` counts every attempt, the first included. The delay after
/// failed attempt `n` is `backoff_base * 2^(n-1)`, capped at `max_backoff`.
///
/// [`RetryPolicy::delays`] yields the schedule as a `tokio_retry2`
/// strategy, shortened by attempts already made.
///
/// # Examples
///
/// ```
/// use herald_rate_limit::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(60), false);
/// let delays: Vec<_> = policy.delays(0).collect();
/// assert_eq!(delays, vec![Duration::from_secs(1), Duration::from_secs(2)]);
/// assert_eq!(policy.delays(1).collect::<Vec<_>>(), vec![Duration::from_secs(2)]);
/// assert_eq!(policy.remaining(3), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    max_attempts: u32,
    /// Delay after the first failure
    backoff_base: Duration,
    /// Upper bound on any single delay
    max_backoff: Duration,
    /// Randomize delays
    jitter: bool,
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(max_attempts: u32, backoff_base: Duration, max_backoff: Duration, jitter: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
            max_backoff,
            jitter,
        }
    }

    /// Attempts still allowed after `attempts_made` failed ones.
    pub fn remaining(&self, attempts_made: u32) -> u32 {
        self.max_attempts.saturating_sub(attempts_made)
    }

    /// Delays between the attempts still allowed after `attempts_made`.
    ///
    /// The schedule resumes where `attempts_made` left it, so a caller
    /// that already failed twice waits `backoff_base * 4` next. Empty once
    /// at most one attempt remains.
    pub fn delays(&self, attempts_made: u32) -> impl Iterator<Item = Duration> + use<> {
        let randomize = self.jitter;
        let retries = self.remaining(attempts_made).saturating_sub(1) as usize;
        let base_ms = u64::try_from(self.backoff_base.as_millis()).unwrap_or(u64::MAX);
        ExponentialFactorBackoff::from_millis(base_ms, 2.0)
            .max_delay(self.max_backoff)
            .skip(attempts_made as usize)
            .map(move |delay| if randomize { jitter(delay) } else { delay })
            .take(retries)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(60), false)
    }
}
