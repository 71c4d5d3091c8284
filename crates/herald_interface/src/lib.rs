//! Trait seams between the orchestrator and the outside world.
//!
//! External services are reached through narrow capability traits
//! ([`ContentGenerator`], [`ImageGenerator`], [`TrendSource`],
//! [`SocialPlatform`]). Persistence goes through [`AnalyticsStore`] and
//! [`DependencyStateStore`]. Real clients, stubs and storage backends all
//! implement the same traits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod capabilities;
mod store;

pub use capabilities::{ContentGenerator, ImageGenerator, SocialPlatform, TrendSource};
pub use store::{AnalyticsStore, DependencyStateStore};
