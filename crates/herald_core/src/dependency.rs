//! External dependencies the orchestrator calls.

use serde::{Deserialize, Serialize};

/// An external service guarded by its own rate budget and circuit breaker.
///
/// The snake_case names are stable: they label metrics and key persisted
/// dependency state.
///
/// # Examples
///
/// ```
/// use herald_core::Dependency;
/// use std::str::FromStr;
///
/// assert_eq!(Dependency::SocialPlatform.to_string(), "social_platform");
/// assert_eq!(Dependency::from_str("trend_monitor").unwrap(), Dependency::TrendMonitor);
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dependency {
    /// AI text generation
    ContentGenerator,
    /// AI image generation
    ImageGenerator,
    /// Trend search
    TrendMonitor,
    /// The social platform receiving posts
    SocialPlatform,
}
