//! Error types for the Herald posting bot.
//!
//! Every error follows the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - Constructors use `#[track_caller]` for automatic location capture
//!
//! Errors raised by external dependencies also carry a [`FailureClass`],
//! which drives retry, circuit breaking and attempt bookkeeping.
//!
//! # Examples
//!
//! ```
//! use herald_error::{HeraldResult, PlatformError, PlatformErrorKind};
//!
//! fn publish() -> HeraldResult<String> {
//!     Err(PlatformError::new(PlatformErrorKind::Unauthorized("token revoked".into())))?
//! }
//!
//! assert!(publish().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod content;
mod database;
mod error;
mod failure;
mod generation;
mod platform;
mod server;

pub use config::ConfigError;
pub use content::{ContentError, ContentErrorKind};
pub use database::{DatabaseError, DatabaseErrorKind, DatabaseResult};
pub use error::{HeraldError, HeraldErrorKind, HeraldResult};
pub use failure::{Classify, FailureClass};
pub use generation::{GenerationError, GenerationErrorKind};
pub use platform::{PlatformError, PlatformErrorKind};
pub use server::{ServerError, ServerErrorKind};
