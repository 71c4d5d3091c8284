//! Rate limiting and failure isolation for Herald's external dependencies.
//!
//! Every dependency owns a [`DependencyState`]: a fixed-window
//! [`RateBudget`] plus a three-state [`CircuitBreaker`]. The types here are
//! plain state machines driven by an explicit `now`; loading, saving and
//! concurrency control belong to the caller.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use herald_core::Dependency;
//! use herald_rate_limit::{DependencyLimits, DependencyState};
//!
//! let limits = DependencyLimits::builder().max_calls(2).build();
//! let now = Utc::now();
//! let mut state = DependencyState::new(Dependency::SocialPlatform, &limits, now);
//!
//! assert!(state.budget_mut().try_consume(now));
//! assert!(state.budget_mut().try_consume(now));
//! assert!(!state.budget_mut().try_consume(now));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod budget;
mod circuit;
mod config;
mod retry;
mod state;

pub use budget::RateBudget;
pub use circuit::{CircuitBreaker, CircuitPhase, CircuitPolicy};
pub use config::{DependencyLimits, DependencyLimitsSet, RetryConfig};
pub use retry::RetryPolicy;
pub use state::DependencyState;

pub(crate) fn to_delta(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
}
