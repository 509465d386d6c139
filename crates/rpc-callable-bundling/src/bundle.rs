//! [`Issuer`] and [`BundleState`]: the per-partition accumulation the
//! bundling service mutates under its bundles-map lock, and the flush
//! routine that drains a detached bundle.

use crate::config::BundlingDescriptor;
use crate::events::{BundleEvent, FlushTrigger};
use rpc_callable_core::{ApiException, EventListeners, ScheduledHandle};
use std::time::Instant;
use tokio::sync::oneshot;
use tower::{Service, ServiceExt};

#[cfg(feature = "metrics")]
use metrics::{counter, histogram};

#[cfg(feature = "tracing")]
use tracing::debug;

/// Per-entry handle within a bundle: the original request and the one-shot
/// sink delivering either a response or a failure back to the submitter.
///
/// Invariant: exactly one of `Ok`/`Err` is ever sent through `sender`.
pub(crate) struct Issuer<Req, Resp> {
    pub(crate) request: Req,
    pub(crate) sender: oneshot::Sender<Result<Resp, ApiException>>,
    #[allow(dead_code)]
    pub(crate) submitted_at: Instant,
}

/// The accumulating state for one open bundle.
pub(crate) struct BundleState<Req, Resp> {
    pub(crate) issuers: Vec<Issuer<Req, Resp>>,
    pub(crate) accumulated_elements: usize,
    pub(crate) accumulated_bytes: usize,
    pub(crate) flush_handle: Option<ScheduledHandle>,
}

impl<Req, Resp> BundleState<Req, Resp> {
    pub(crate) fn new() -> Self {
        Self {
            issuers: Vec::new(),
            accumulated_elements: 0,
            accumulated_bytes: 0,
            flush_handle: None,
        }
    }

    pub(crate) fn push(&mut self, issuer: Issuer<Req, Resp>, elements: usize, bytes: usize) {
        self.issuers.push(issuer);
        self.accumulated_elements += elements;
        self.accumulated_bytes += bytes;
    }

    /// The wait time of the oldest (first-submitted) issuer, used to decide
    /// whether a bundle has crossed `delay_threshold`. Only meaningful while
    /// the bundle is still open.
    pub(crate) fn oldest_wait(&self) -> std::time::Duration {
        self.issuers
            .first()
            .map(|i| i.submitted_at.elapsed())
            .unwrap_or_default()
    }
}

/// Drains a detached bundle: merges its requests, issues the merged call,
/// and fans the result (or failure) back out to every issuer in submission
/// order. Each issuer receives exactly one send on its one-shot sender.
pub(crate) async fn flush<S, D, Req, Resp>(
    descriptor: &D,
    inner: &mut S,
    state: BundleState<Req, Resp>,
    listeners: &EventListeners<BundleEvent>,
    name: &str,
    trigger: FlushTrigger,
) where
    S: Service<Req, Response = Resp, Error = ApiException>,
    D: BundlingDescriptor<Req, Resp> + ?Sized,
{
    let BundleState {
        issuers,
        accumulated_elements,
        ..
    } = state;
    let request_count = issuers.len();

    let (requests, senders): (Vec<Req>, Vec<oneshot::Sender<Result<Resp, ApiException>>>) =
        issuers.into_iter().map(|i| (i.request, i.sender)).unzip();

    #[cfg(feature = "tracing")]
    debug!(bundle = %name, %trigger, requests = request_count, elements = accumulated_elements, "flushing bundle");

    let merged = descriptor.merge_requests(&requests);
    let call_result = match inner.ready().await {
        Ok(ready) => ready.call(merged).await,
        Err(e) => Err(e),
    };

    match call_result {
        Ok(response) => {
            #[cfg(feature = "metrics")]
            {
                counter!("bundle_flushes_total", "bundle" => name.to_string(), "trigger" => trigger.to_string())
                    .increment(1);
                histogram!("bundle_size", "bundle" => name.to_string()).record(request_count as f64);
            }

            listeners.emit(&BundleEvent::Flush {
                pattern_name: name.to_string(),
                timestamp: Instant::now(),
                trigger,
                request_count,
                element_count: accumulated_elements,
            });

            let parts = descriptor.split_response(response, &requests);
            for (sender, part) in senders.into_iter().zip(parts) {
                let _ = sender.send(Ok(part));
            }
        }
        Err(error) => {
            #[cfg(feature = "tracing")]
            debug!(bundle = %name, requests = request_count, "merged call failed, fanning out exception");

            listeners.emit(&BundleEvent::ExceptionFanOut {
                pattern_name: name.to_string(),
                timestamp: Instant::now(),
                request_count,
            });

            let errors = descriptor.split_exception(&error, senders.len());
            for (sender, err) in senders.into_iter().zip(errors) {
                let _ = sender.send(Err(err));
            }
        }
    }
}
