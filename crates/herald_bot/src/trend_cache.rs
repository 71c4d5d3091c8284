//! Time-bounded cache for the last trend signal.

use chrono::{DateTime, Utc};
use herald_core::TrendSignal;
use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Entry {
    signal: TrendSignal,
    stored_at: DateTime<Utc>,
}

/// Holds the most recent [`TrendSignal`] for `ttl`.
///
/// Freshness is judged against the time the signal was stored, using the
/// caller's clock.
#[derive(Debug)]
pub struct TrendCache {
    ttl: Duration,
    entry: Mutex<Option<Entry>>,
}

impl TrendCache {
    /// An empty cache.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// The cached signal if it is younger than the TTL at `now`.
    pub fn fresh(&self, now: DateTime<Utc>) -> Option<TrendSignal> {
        let entry = self.entry.lock();
        let entry = entry.as_ref()?;
        let age = now.signed_duration_since(entry.stored_at).to_std().ok()?;
        (age < self.ttl).then(|| entry.signal.clone())
    }

    /// Replace the cached signal.
    pub fn store(&self, signal: TrendSignal, now: DateTime<Utc>) {
        *self.entry.lock() = Some(Entry {
            signal,
            stored_at: now,
        });
    }

    /// Drop the cached signal.
    pub fn clear(&self) {
        *self.entry.lock() = None;
    }
}
