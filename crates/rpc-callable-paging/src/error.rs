//! [`PagingError`]: unifies a merged-call failure with a fixed-size
//! collection precondition violation detected while walking pages, so a
//! [`crate::PagedListResponse::expand_to_fixed_size_collection`] stream can
//! surface either from the same item type.

use rpc_callable_core::{ApiException, ValidationException};

/// Failure surfaced from a fixed-size-collection stream.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PagingError {
    /// The underlying callable failed while fetching a page.
    #[error(transparent)]
    Call(#[from] ApiException),
    /// A page boundary did not align with the requested collection size.
    #[error(transparent)]
    Validation(#[from] ValidationException),
}
