//! Error taxonomy: [`ApiException`] and [`ValidationException`].
//!
//! `ApiException` is the single surfaced failure type for RPC failures
//! (thrown by the blocking `call()` and carried by a failed `futureCall()`
//! future). `ValidationException` is raised synchronously by the paging
//! decorator on misuse of `expandToFixedSizeCollection`.

use crate::status::StatusCode;
use std::error::Error as StdError;
use std::fmt;

/// The unified failure surfaced by a composed callable.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiException {
    /// The abstract status code this failure classifies as.
    pub code: StatusCode,
    /// A human-readable description, usually derived from the underlying
    /// failure's own message.
    pub message: String,
    /// The original failure, if one was available to wrap.
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ApiException {
    /// Builds an `ApiException` with no recorded source.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Builds an `ApiException` wrapping an underlying error.
    pub fn from_source(
        code: StatusCode,
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl Clone for ApiException {
    /// Clones the code and message; the source (not guaranteed `Clone`) is
    /// dropped, matching how the teacher's `CoalesceError` degrades its
    /// wrapped error across clone boundaries used for fan-out.
    fn clone(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            source: None,
        }
    }
}

/// Why `expandToFixedSizeCollection` rejected its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    /// The requested collection size is smaller than the page size the
    /// upstream is already returning.
    CollectionSizeTooSmall {
        /// The requested fixed collection size `N`.
        requested: usize,
        /// The page size actually observed from the first page.
        page_size: usize,
    },
    /// A page's elements would push the accumulated count past `N` without
    /// landing exactly on it.
    PageOverrun {
        /// The configured fixed collection size `N`.
        collection_size: usize,
    },
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReason::CollectionSizeTooSmall {
                requested,
                page_size,
            } => write!(
                f,
                "collection size too small: requested {requested}, but upstream page size is {page_size}"
            ),
            ValidationReason::PageOverrun { collection_size } => {
                write!(f, "too many elements: page boundary does not align with collection size {collection_size}")
            }
        }
    }
}

/// Synchronous precondition failure from the paging API.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct ValidationException {
    /// The specific precondition that was violated.
    pub reason: ValidationReason,
}

impl ValidationException {
    /// Builds a new validation exception from a reason.
    pub fn new(reason: ValidationReason) -> Self {
        Self { reason }
    }
}

/// Implemented by error types that carry (or can be mapped onto) an abstract
/// [`StatusCode`]. The retry decorator classifies failures through this
/// trait; a transport adapter implements it for its own error type.
pub trait ClassifiableError {
    /// Returns the status code this failure should be classified as.
    fn status_code(&self) -> StatusCode;

    /// Returns a rendered message used when wrapping this failure into an
    /// [`ApiException`]. Implementations without a natural `Display` may
    /// return a fixed string.
    fn classify_message(&self) -> String;
}

impl ClassifiableError for ApiException {
    fn status_code(&self) -> StatusCode {
        self.code
    }

    fn classify_message(&self) -> String {
        self.message.clone()
    }
}
