//! Request bundling for Tower services.
//!
//! This crate provides a Tower layer that merges same-partition requests
//! submitted within a short window into a single call to the inner service,
//! then fans the merged response (or failure) back out to every submitter.
//!
//! # How It Works
//!
//! 1. The first request for a fresh partition key opens a bundle and starts
//!    a `delay_threshold` timer.
//! 2. Subsequent same-key requests append to the open bundle.
//! 3. A bundle flushes — merges its requests and issues one call — either
//!    when `accumulated_elements` crosses `element_count_threshold` (flushed
//!    inline, on the triggering submitter) or when the delay timer fires
//!    (flushed on the scheduler).
//! 4. The merged response is split back across every submitter, in
//!    submission order; a merged failure is fanned out to all of them.
//!
//! # Example
//!
//! ```rust
//! use rpc_callable_bundling::{BundlingDescriptor, BundlingLayer, BundlingSettings};
//! use rpc_callable_core::ApiException;
//! use tower::{Service, ServiceBuilder, ServiceExt};
//!
//! struct SumDescriptor;
//!
//! impl BundlingDescriptor<Vec<i32>, i32> for SumDescriptor {
//!     type Key = ();
//!     fn bundle_partition_key(&self, _req: &Vec<i32>) -> Self::Key {}
//!     fn count_elements(&self, req: &Vec<i32>) -> usize { req.len() }
//!     fn count_bytes(&self, req: &Vec<i32>) -> usize { req.len() * 4 }
//!     fn merge_requests(&self, requests: &[Vec<i32>]) -> Vec<i32> {
//!         requests.iter().flatten().copied().collect()
//!     }
//!     fn split_response(&self, response: i32, requests: &[Vec<i32>]) -> Vec<i32> {
//!         requests.iter().map(|_| response).collect()
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = tower::service_fn(|req: Vec<i32>| async move {
//!     Ok::<_, ApiException>(req.iter().sum::<i32>())
//! });
//! let service = ServiceBuilder::new()
//!     .layer(BundlingLayer::new(
//!         SumDescriptor,
//!         BundlingSettings::builder().element_count_threshold(2).build(),
//!     ))
//!     .service(backend);
//! # Ok(())
//! # }
//! ```
//!
//! # Use Cases
//!
//! - **Batched RPCs**: Many APIs expose a batch endpoint alongside a
//!   per-item one; bundling lets callers keep issuing per-item calls while
//!   the transport amortizes them into batches.
//! - **Write coalescing**: Merge several small writes arriving within a
//!   short window into one larger write.
//!
//! # Requirements
//!
//! - The partition key type must implement `Hash + Eq + Clone + Send + Sync`.
//! - [`BundlingDescriptor::merge_requests`] and
//!   [`BundlingDescriptor::split_response`] must agree on ordering: the
//!   `requests` slice passed to `split_response` is in the same submission
//!   order as the slice passed to `merge_requests`.

mod bundle;
mod config;
mod events;
mod factory;
mod layer;
mod service;

pub use config::{BundlingDescriptor, BundlingSettings, BundlingSettingsBuilder};
pub use events::{BundleEvent, FlushTrigger};
pub use factory::BundlerFactory;
pub use layer::BundlingLayer;
pub use service::BundlingService;
