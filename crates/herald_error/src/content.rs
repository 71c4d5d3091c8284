//! Content lifecycle errors.

/// Content item lifecycle violations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ContentErrorKind {
    /// The requested status change is not part of the lifecycle
    #[display("Invalid status transition from {} to {}", from, to)]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },
    /// The item reached a terminal status and can no longer change
    #[display("Content item {} is {} and cannot be modified", id, status)]
    Immutable {
        /// Item identifier
        id: String,
        /// Terminal status
        status: String,
    },
    /// The text is empty after sanitization
    #[display("Content text is empty")]
    EmptyText,
    /// A persisted status string did not parse
    #[display("Unknown content status: {}", _0)]
    UnknownStatus(String),
}

/// Content error with source location tracking.
///
/// # Examples
///
/// ```
/// use herald_error::{ContentError, ContentErrorKind};
///
/// let err = ContentError::new(ContentErrorKind::EmptyText);
/// assert!(format!("{}", err).contains("empty"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Content Error: {} at line {} in {}", kind, line, file)]
pub struct ContentError {
    /// The kind of error that occurred
    pub kind: ContentErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ContentError {
    /// Create a new ContentError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ContentErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
