//! Errors raised by content generators, image generators and trend sources.

use crate::{Classify, FailureClass};

/// Generation failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum GenerationErrorKind {
    /// The request did not complete in time
    #[display("Request timed out: {}", _0)]
    Timeout(String),
    /// The provider reported quota or throttling
    #[display("Quota exhausted: {}", _0)]
    Quota(String),
    /// The provider failed to serve the request
    #[display("Service error: {}", _0)]
    ServiceError(String),
    /// The request was rejected as invalid
    #[display("Invalid input: {}", _0)]
    InvalidInput(String),
    /// Credentials were rejected
    #[display("Authentication failed: {}", _0)]
    Auth(String),
    /// The provider answered with something unusable
    #[display("Malformed response: {}", _0)]
    MalformedResponse(String),
}

impl Classify for GenerationErrorKind {
    fn failure_class(&self) -> FailureClass {
        match self {
            GenerationErrorKind::Timeout(_) | GenerationErrorKind::ServiceError(_) => {
                FailureClass::Transient
            }
            GenerationErrorKind::Quota(_) => FailureClass::RateLimited,
            GenerationErrorKind::InvalidInput(_) | GenerationErrorKind::MalformedResponse(_) => {
                FailureClass::Permanent
            }
            GenerationErrorKind::Auth(_) => FailureClass::Auth,
        }
    }
}

/// Generation error with source location tracking.
///
/// # Examples
///
/// ```
/// use herald_error::{GenerationError, GenerationErrorKind};
///
/// let err = GenerationError::new(GenerationErrorKind::Quota("60 per hour".into()));
/// assert!(format!("{}", err).contains("Quota exhausted"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Generation Error: {} at line {} in {}", kind, line, file)]
pub struct GenerationError {
    /// The kind of error that occurred
    pub kind: GenerationErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl GenerationError {
    /// Create a new GenerationError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GenerationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl Classify for GenerationError {
    fn failure_class(&self) -> FailureClass {
        self.kind.failure_class()
    }
}
