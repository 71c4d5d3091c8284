//! Errors raised by social platforms.

use crate::{Classify, FailureClass};

/// Social platform failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum PlatformErrorKind {
    /// The platform throttled the request
    #[display("Rate limited: {}", _0)]
    RateLimited(String),
    /// Credentials were rejected or lack permission
    #[display("Unauthorized: {}", _0)]
    Unauthorized(String),
    /// The post was rejected by platform validation
    #[display("Validation failed: {}", _0)]
    Validation(String),
    /// Timeout, connection failure or server-side error
    #[display("Transient failure: {}", _0)]
    Transient(String),
    /// Any other non-retryable rejection
    #[display("Permanent failure: {}", _0)]
    Permanent(String),
}

impl PlatformErrorKind {
    /// Map an HTTP status code returned by a platform API.
    ///
    /// # Examples
    ///
    /// ```
    /// use herald_error::PlatformErrorKind;
    ///
    /// let kind = PlatformErrorKind::from_status(429, "slow down");
    /// assert!(matches!(kind, PlatformErrorKind::RateLimited(_)));
    /// ```
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => PlatformErrorKind::RateLimited(message),
            401 | 403 => PlatformErrorKind::Unauthorized(message),
            400 | 422 => PlatformErrorKind::Validation(message),
            408 | 500..=599 => PlatformErrorKind::Transient(message),
            _ => PlatformErrorKind::Permanent(message),
        }
    }
}

impl Classify for PlatformErrorKind {
    fn failure_class(&self) -> FailureClass {
        match self {
            PlatformErrorKind::RateLimited(_) => FailureClass::RateLimited,
            PlatformErrorKind::Unauthorized(_) => FailureClass::Auth,
            PlatformErrorKind::Validation(_) | PlatformErrorKind::Permanent(_) => {
                FailureClass::Permanent
            }
            PlatformErrorKind::Transient(_) => FailureClass::Transient,
        }
    }
}

/// Platform error with source location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Platform Error: {} at line {} in {}", kind, line, file)]
pub struct PlatformError {
    /// The kind of error that occurred
    pub kind: PlatformErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl PlatformError {
    /// Create a new PlatformError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PlatformErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl Classify for PlatformError {
    fn failure_class(&self) -> FailureClass {
        self.kind.failure_class()
    }
}
