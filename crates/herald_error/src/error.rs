//! Top-level error wrapper types.

use crate::{
    ConfigError, ContentError, DatabaseError, GenerationError, PlatformError, ServerError,
};

/// Every error the bot can surface.
///
/// # Examples
///
/// ```
/// use herald_error::{ConfigError, HeraldError};
///
/// let err: HeraldError = ConfigError::new("missing [retry] table").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum HeraldErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Content lifecycle error
    #[from(ContentError)]
    Content(ContentError),
    /// Storage error
    #[from(DatabaseError)]
    Database(DatabaseError),
    /// Content, image or trend generation error
    #[from(GenerationError)]
    Generation(GenerationError),
    /// Social platform error
    #[from(PlatformError)]
    Platform(PlatformError),
    /// Metrics or HTTP API error
    #[from(ServerError)]
    Server(ServerError),
}

/// Herald error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Herald Error: {}", _0)]
pub struct HeraldError(Box<HeraldErrorKind>);

impl HeraldError {
    /// Create a new error from a kind.
    pub fn new(kind: HeraldErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &HeraldErrorKind {
        &self.0
    }
}

impl<T> From<T> for HeraldError
where
    T: Into<HeraldErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Herald operations.
pub type HeraldResult<T> = std::result::Result<T, HeraldError>;
