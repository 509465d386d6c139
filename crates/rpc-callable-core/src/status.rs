//! Abstract status codes used to classify call failures.
//!
//! The core never couples to a concrete transport's error type. A transport
//! adapter (outside this crate) maps its own failures onto [`StatusCode`] by
//! implementing [`ClassifiableError`](crate::error::ClassifiableError) for its
//! error type.

use std::fmt;

/// Transport-agnostic status code carried by an [`ApiException`](crate::error::ApiException).
///
/// This is intentionally a small, abstract set — just enough for the retry
/// decorator's classification rules. A concrete transport (gRPC, HTTP, ...)
/// maps its own status taxonomy down to this set at the primitive callable
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The call completed successfully. Rarely carried by an error, but kept
    /// for completeness of the taxonomy.
    Ok,
    /// The service is temporarily unavailable, typically transient.
    Unavailable,
    /// The failure carries no recognized code, or is an opaque runtime error.
    Unknown,
    /// The call did not complete within its deadline.
    DeadlineExceeded,
    /// The system is not in a state required for the call's execution.
    FailedPrecondition,
}

impl StatusCode {
    /// Returns `true` for codes that commonly represent transient,
    /// retry-eligible failures. This is a convenience default — callers
    /// configure their own [`RetryableCodes`] set rather than relying on it.
    pub fn is_transient_default(self) -> bool {
        matches!(
            self,
            StatusCode::Unavailable | StatusCode::Unknown | StatusCode::DeadlineExceeded
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::Ok => "OK",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::Unknown => "UNKNOWN",
            StatusCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
        };
        f.write_str(s)
    }
}
