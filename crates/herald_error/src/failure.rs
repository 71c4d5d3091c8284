//! Failure classification shared by every external dependency.

/// How a failed dependency call should be treated.
///
/// The class decides whether a call is retried, whether it counts toward
/// the circuit breaker, and which attempt outcome gets recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum FailureClass {
    /// Timeouts, connection resets, 5xx responses. Retried with backoff.
    #[display("transient")]
    Transient,
    /// The dependency reported throttling or quota exhaustion.
    #[display("rate_limited")]
    RateLimited,
    /// Invalid input or content rejected by validation. Never retried.
    #[display("permanent")]
    Permanent,
    /// Credentials rejected. Requires operator intervention.
    #[display("auth")]
    Auth,
}

impl FailureClass {
    /// Whether another attempt within the same cycle may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureClass::Transient)
    }

    /// Whether the failure counts toward the dependency's circuit breaker.
    ///
    /// Every class counts except `Auth`, which halts scheduling instead.
    pub fn trips_circuit(&self) -> bool {
        !matches!(self, FailureClass::Auth)
    }
}

/// Errors that can be mapped onto a [`FailureClass`].
///
/// # Examples
///
/// ```
/// use herald_error::{Classify, FailureClass, GenerationError, GenerationErrorKind};
///
/// let err = GenerationError::new(GenerationErrorKind::Timeout("30s elapsed".into()));
/// assert_eq!(err.failure_class(), FailureClass::Transient);
/// ```
pub trait Classify {
    /// The failure class of this error.
    fn failure_class(&self) -> FailureClass;
}
