//! Core infrastructure for rpc-callable.
//!
//! This crate provides the shared building blocks used by every decorator in
//! the `rpc-callable` stack:
//! - [`CallContext`], the immutable per-invocation carrier threaded through
//!   every layer
//! - [`StatusCode`] and the [`ApiException`]/[`ValidationException`] error
//!   taxonomy
//! - [`Clock`] and [`Scheduler`], the injectable time sources that make retry
//!   backoff and bundling flush timers deterministic in tests
//! - the event system ([`EventListeners`]) used for observability hooks

pub mod clock;
pub mod context;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod status;

pub use clock::{Clock, FakeClock, SystemClock};
pub use context::CallContext;
pub use error::{ApiException, ClassifiableError, ValidationException, ValidationReason};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use scheduler::{RecordingScheduler, ScheduledHandle, Scheduler, TokioScheduler};
pub use status::StatusCode;
