//! Composable client-side RPC middleware.
//!
//! This crate is the facade tying together the individual decorator crates
//! ([`rpc_callable_retry`], [`rpc_callable_paging`], [`rpc_callable_bundling`])
//! behind a single builder-style entry point, [`UnaryApiCallable`]. A
//! primitive callable — a `tower::Service<(Req, CallContext)>` adapting some
//! transport — is wrapped one decorator at a time:
//!
//! ```rust
//! use rpc_callable::UnaryApiCallable;
//! use rpc_callable_core::{CallContext, ClassifiableError, StatusCode};
//! use rpc_callable_retry::{RetryableCodes, RetrySettings};
//! use std::sync::Arc;
//! use tower::service_fn;
//!
//! #[derive(Debug, Clone)]
//! struct Failure(StatusCode);
//! impl std::fmt::Display for Failure {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{}", self.0)
//!     }
//! }
//! impl std::error::Error for Failure {}
//! impl ClassifiableError for Failure {
//!     fn status_code(&self) -> StatusCode { self.0 }
//!     fn classify_message(&self) -> String { self.to_string() }
//! }
//!
//! # async fn example() {
//! let primitive = service_fn(|(req, _ctx): (i32, CallContext)| async move {
//!     Ok::<_, Failure>(req + 1)
//! });
//!
//! let callable = UnaryApiCallable::create(primitive)
//!     .retryable_on(RetryableCodes::of([StatusCode::Unavailable]))
//!     .retrying(
//!         RetrySettings::aggressive().build(),
//!         Arc::new(rpc_callable_core::TokioScheduler::new()),
//!         Arc::new(rpc_callable_core::SystemClock::default()),
//!     );
//!
//! assert_eq!(callable.call(1).await.unwrap(), 2);
//! # }
//! ```

mod callable;
mod context_bound;

pub use callable::{BundlingCallable, PageStreamingCallable, UnaryApiCallable};

// Re-exported so downstream crates can build a full stack against this
// facade alone, without depending on the decorator crates directly.
pub use rpc_callable_bundling::{BundlingDescriptor, BundlingService, BundlingSettings};
pub use rpc_callable_core::{ApiException, CallContext, Clock, Scheduler, StatusCode};
pub use rpc_callable_paging::PageDescriptor;
pub use rpc_callable_retry::{RetryableCodes, RetrySettings};
