//! Errors raised by the metrics registry and the HTTP API.

/// Server failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub enum ServerErrorKind {
    /// A metric could not be registered or encoded
    #[display("Metrics error: {}", _0)]
    Metrics(String),
    /// The listener could not bind its address
    #[display("Failed to bind {}", _0)]
    Bind(String),
    /// The server stopped with an I/O failure
    #[display("Server I/O error: {}", _0)]
    Io(String),
}

/// Server error with source location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Server Error: {} at line {} in {}", kind, line, file)]
pub struct ServerError {
    /// The error kind
    pub kind: ServerErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl ServerError {
    /// Create a new ServerError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ServerErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
