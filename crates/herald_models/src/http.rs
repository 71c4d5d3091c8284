//! HTTP failure mapping shared by the provider clients.

use herald_error::{GenerationError, GenerationErrorKind};

/// Map a non-success HTTP status to a generation error.
///
/// # Examples
///
/// ```
/// use herald_error::{Classify, FailureClass};
/// use herald_models::error_from_status;
///
/// assert_eq!(error_from_status(429, "slow down").failure_class(), FailureClass::RateLimited);
/// assert_eq!(error_from_status(503, "").failure_class(), FailureClass::Transient);
/// ```
#[track_caller]
pub fn error_from_status(status: u16, body: impl Into<String>) -> GenerationError {
    let message = format!("HTTP {status}: {}", body.into());
    let kind = match status {
        429 => GenerationErrorKind::Quota(message),
        401 | 403 => GenerationErrorKind::Auth(message),
        408 => GenerationErrorKind::Timeout(message),
        400..=499 => GenerationErrorKind::InvalidInput(message),
        _ => GenerationErrorKind::ServiceError(message),
    };
    GenerationError::new(kind)
}

/// Map a transport error to a generation error.
#[track_caller]
pub fn error_from_reqwest(err: reqwest::Error) -> GenerationError {
    let kind = if err.is_timeout() {
        GenerationErrorKind::Timeout(err.to_string())
    } else if err.is_decode() {
        GenerationErrorKind::MalformedResponse(err.to_string())
    } else if let Some(status) = err.status() {
        return error_from_status(status.as_u16(), err.to_string());
    } else {
        GenerationErrorKind::ServiceError(err.to_string())
    };
    GenerationError::new(kind)
}

/// Read an error body, tolerating failures.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}
