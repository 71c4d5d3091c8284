//! Fixed-window call budget.

use crate::to_delta;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Calls allowed against one dependency in a fixed time window.
///
/// The window starts at the first call after the previous window elapsed.
/// `calls_used` never exceeds `max_calls` within a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct RateBudget {
    /// Start of the current window
    window_start: DateTime<Utc>,
    /// Length of a window
    window_duration: Duration,
    /// Calls allowed per window
    max_calls: u32,
    /// Calls reserved in the current window
    calls_used: u32,
}

impl RateBudget {
    /// A fresh budget whose window starts at `now`.
    pub fn new(max_calls: u32, window_duration: Duration, now: DateTime<Utc>) -> Self {
        Self::from_parts(now, window_duration, max_calls, 0)
    }

    /// Rebuild a budget read back from storage.
    pub fn from_parts(
        window_start: DateTime<Utc>,
        window_duration: Duration,
        max_calls: u32,
        calls_used: u32,
    ) -> Self {
        Self {
            window_start,
            window_duration,
            max_calls,
            calls_used,
        }
    }

    /// End of the current window, or `None` if it lies beyond representable time.
    pub fn window_end(&self) -> Option<DateTime<Utc>> {
        self.window_start
            .checked_add_signed(to_delta(self.window_duration))
    }

    /// Whether the current window is over at `now`.
    pub fn window_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.window_end().is_some_and(|end| now >= end)
    }

    /// Start a new window if the current one elapsed. Returns whether it reset.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        if self.window_elapsed(now) {
            self.window_start = now;
            self.calls_used = 0;
            true
        } else {
            false
        }
    }

    /// Calls left in the current window, ignoring elapse.
    pub fn remaining(&self) -> u32 {
        self.max_calls.saturating_sub(self.calls_used)
    }

    /// Whether a call could be reserved at `now`.
    pub fn has_capacity(&self, now: DateTime<Utc>) -> bool {
        self.window_elapsed(now) || self.remaining() > 0
    }

    /// Reserve one call, resetting the window first if it elapsed.
    ///
    /// Returns `false` without changing the count when the budget is spent.
    pub fn try_consume(&mut self, now: DateTime<Utc>) -> bool {
        self.refresh(now);
        if self.calls_used < self.max_calls {
            self.calls_used += 1;
            true
        } else {
            false
        }
    }

    /// Treat the rest of the current window as spent.
    ///
    /// Used when the dependency itself reports throttling.
    pub fn exhaust(&mut self, now: DateTime<Utc>) {
        self.refresh(now);
        self.calls_used = self.max_calls;
    }

    /// Apply new limits while keeping the current window.
    pub fn reconfigure(&mut self, max_calls: u32, window_duration: Duration) {
        self.max_calls = max_calls;
        self.window_duration = window_duration;
        self.calls_used = self.calls_used.min(max_calls);
    }
}
