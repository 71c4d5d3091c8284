//! Social platform clients.
//!
//! - [`XClient`]: posts through the X API v2 with an OAuth 2.0 user token.
//! - [`DryRunPlatform`]: logs posts instead of publishing them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod dry_run;
mod x;

pub use dry_run::DryRunPlatform;
pub use x::{X_MAX_LOOKUP_IDS, X_MAX_TEXT_LENGTH, XClient};
