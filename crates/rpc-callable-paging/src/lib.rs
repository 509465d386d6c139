//! Pagination for Tower-based list callables.
//!
//! This crate hides multi-call pagination behind a unified element stream,
//! while also exposing page-level and fixed-size-chunk views over the same
//! underlying sequence of calls.
//!
//! # How It Works
//!
//! 1. [`PagedListResponse::get_page`] fetches the first page using the
//!    empty token; [`Page::get_next_page`] rebuilds the request with the
//!    current page's next-token and fetches the page after it.
//! 2. [`PagedListResponse::iterate_all_elements`] flattens that page walk
//!    into a lazy element stream, advancing to the next page only once the
//!    current page's elements are exhausted.
//! 3. [`PagedListResponse::expand_to_fixed_size_collection`] regroups the
//!    same walk into exactly-`N`-sized chunks, validating up front that `N`
//!    is at least as large as the first page and failing mid-stream if a
//!    page boundary does not land exactly on a multiple of `N`.
//!
//! # Example
//!
//! ```rust
//! use futures::StreamExt;
//! use rpc_callable_paging::{PageDescriptor, PagedListResponse};
//! use rpc_callable_core::ApiException;
//! use tower::service_fn;
//!
//! #[derive(Clone)]
//! struct Request { token: String }
//! #[derive(Clone)]
//! struct Response { items: Vec<i32>, next_token: String }
//!
//! struct Descriptor;
//! impl PageDescriptor<Request, Response, i32> for Descriptor {
//!     fn with_page_token(&self, req: &Request, token: &str) -> Request {
//!         Request { token: token.to_string(), ..req.clone() }
//!     }
//!     fn with_page_size(&self, req: &Request, _size: usize) -> Request { req.clone() }
//!     fn extract_page_size(&self, _req: &Request) -> usize { 1 }
//!     fn extract_next_token(&self, resp: &Response) -> String { resp.next_token.clone() }
//!     fn extract_resources(&self, resp: &Response) -> Vec<i32> { resp.items.clone() }
//! }
//!
//! # async fn example() {
//! let backend = service_fn(|req: Request| async move {
//!     let (items, next_token) = if req.token.is_empty() {
//!         (vec![1], "more".to_string())
//!     } else {
//!         (vec![], String::new())
//!     };
//!     Ok::<_, ApiException>(Response { items, next_token })
//! });
//! let paged = PagedListResponse::new(backend, Descriptor, Request { token: String::new() });
//! let elements: Vec<i32> = paged
//!     .iterate_all_elements()
//!     .map(|r| r.unwrap())
//!     .collect()
//!     .await;
//! assert_eq!(elements, vec![1]);
//! # }
//! ```

mod descriptor;
mod error;
mod events;
mod page;

pub use descriptor::PageDescriptor;
pub use error::PagingError;
pub use events::PageEvent;
pub use page::{Page, PagedListResponse};
