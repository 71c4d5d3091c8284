//! Core data types for the Herald posting bot.
//!
//! This crate holds the domain model shared by every other crate:
//! content items and their lifecycle, threads, post attempts, cycle
//! records, engagement snapshots, generator inputs and outputs, and the
//! [`Clock`] abstraction used by time-window logic.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod attempt;
mod clock;
mod content;
mod cycle;
mod dependency;
mod engagement;
mod generation;
mod post;
mod text;
mod trend;

pub use attempt::{AttemptOutcome, PostAttempt};
pub use clock::{Clock, ManualClock, SystemClock};
pub use content::{ContentItem, ContentItemBuilder, ContentStatus, ImageRef};
pub use cycle::{CycleOutcome, CycleRecord};
pub use dependency::Dependency;
pub use engagement::{EngagementSnapshot, PostEngagement};
pub use generation::{
    GeneratedImage, GeneratedText, GenerationOptions, GenerationOptionsBuilder, Prompt,
};
pub use post::{PostReceipt, PostRequest};
pub use text::{sanitize_text, split_thread};
pub use trend::{TrendQuery, TrendSignal};
