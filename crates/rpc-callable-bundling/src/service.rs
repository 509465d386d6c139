//! [`BundlingService`]: the `tower::Service` implementing spec.md §4.5's
//! submission, flush-trigger, and ordering rules.

use crate::bundle::{flush, BundleState, Issuer};
use crate::config::{BundlingDescriptor, BundlingSettings};
use crate::events::{BundleEvent, FlushTrigger};
use futures::future::BoxFuture;
use hashbrown::HashMap;
use parking_lot::Mutex;
use rpc_callable_core::{ApiException, EventListeners, Scheduler, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::{oneshot, Semaphore};
use tower::{Service, ServiceExt};

#[cfg(feature = "tracing")]
use tracing::debug;

type BundleMap<K, Req, Resp> = Arc<Mutex<HashMap<K, BundleState<Req, Resp>>>>;

/// A service that coalesces same-partition requests into fewer underlying
/// calls. See spec.md §4.5 for the submission and flush algorithm this
/// implements.
pub struct BundlingService<S, D, Req, Resp>
where
    D: BundlingDescriptor<Req, Resp>,
{
    inner: S,
    descriptor: Arc<D>,
    settings: BundlingSettings,
    scheduler: Arc<dyn Scheduler>,
    bundles: BundleMap<D::Key, Req, Resp>,
    in_flight: Arc<Semaphore>,
    event_listeners: EventListeners<BundleEvent>,
    name: String,
    closed: Arc<AtomicBool>,
}

impl<S, D, Req, Resp> BundlingService<S, D, Req, Resp>
where
    D: BundlingDescriptor<Req, Resp>,
{
    pub(crate) fn new(
        inner: S,
        descriptor: Arc<D>,
        settings: BundlingSettings,
        scheduler: Arc<dyn Scheduler>,
        event_listeners: EventListeners<BundleEvent>,
        name: String,
    ) -> Self {
        let permits = if settings.blocking_call_count_threshold == 0 {
            Semaphore::MAX_PERMITS
        } else {
            settings.blocking_call_count_threshold
        };
        Self {
            inner,
            descriptor,
            settings,
            scheduler,
            bundles: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Semaphore::new(permits)),
            event_listeners,
            name,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl<S, D, Req, Resp> Clone for BundlingService<S, D, Req, Resp>
where
    S: Clone,
    D: BundlingDescriptor<Req, Resp>,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            descriptor: Arc::clone(&self.descriptor),
            settings: self.settings,
            scheduler: Arc::clone(&self.scheduler),
            bundles: Arc::clone(&self.bundles),
            in_flight: Arc::clone(&self.in_flight),
            event_listeners: self.event_listeners.clone(),
            name: self.name.clone(),
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<S, D, Req, Resp> BundlingService<S, D, Req, Resp>
where
    S: Service<Req, Response = Resp, Error = ApiException> + Clone + Send + 'static,
    S::Future: Send + 'static,
    D: BundlingDescriptor<Req, Resp> + Send + Sync + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Flushes every currently open bundle and waits for all pending
    /// futures to complete. Marks the service closed first, so submissions
    /// racing this call either land in a bundle this drain collects or are
    /// rejected outright by [`Service::call`].
    pub fn close(&self) -> BoxFuture<'static, ()> {
        self.closed.store(true, Ordering::SeqCst);
        let detached: Vec<(D::Key, BundleState<Req, Resp>)> = {
            let mut bundles = self.bundles.lock();
            bundles.drain().collect()
        };

        let inner = self.inner.clone();
        let descriptor = Arc::clone(&self.descriptor);
        let listeners = self.event_listeners.clone();
        let name = self.name.clone();

        Box::pin(async move {
            for (_key, mut state) in detached {
                if let Some(handle) = state.flush_handle.take() {
                    handle.cancel();
                }
                let mut svc = inner.clone();
                flush(descriptor.as_ref(), &mut svc, state, &listeners, &name, FlushTrigger::External).await;
            }
        })
    }
}

impl<S, D, Req, Resp> Service<Req> for BundlingService<S, D, Req, Resp>
where
    S: Service<Req, Response = Resp, Error = ApiException> + Clone + Send + 'static,
    S::Future: Send + 'static,
    D: BundlingDescriptor<Req, Resp> + Send + Sync + 'static,
    D::Key: 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    type Response = Resp;
    type Error = ApiException;
    type Future = BoxFuture<'static, Result<Resp, ApiException>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        if self.closed.load(Ordering::SeqCst) {
            return Box::pin(async move {
                Err(ApiException::new(
                    StatusCode::FailedPrecondition,
                    "bundler closed: no further submissions permitted",
                ))
            });
        }

        if !self.settings.is_enabled {
            let mut svc = self.inner.clone();
            return Box::pin(async move { svc.ready().await?.call(req).await });
        }

        let key = self.descriptor.bundle_partition_key(&req);
        let elements = self.descriptor.count_elements(&req);
        let bytes = self.descriptor.count_bytes(&req);
        let threshold = self.settings.element_count_threshold;

        let (tx, rx) = oneshot::channel();
        let issuer = Issuer {
            request: req,
            sender: tx,
            submitted_at: Instant::now(),
        };

        let detached = {
            let mut bundles = self.bundles.lock();
            match bundles.get_mut(&key) {
                Some(existing) => {
                    existing.push(issuer, elements, bytes);
                    if existing.accumulated_elements >= threshold {
                        let mut state = bundles.remove(&key).expect("just observed present");
                        if let Some(handle) = state.flush_handle.take() {
                            handle.cancel();
                        }
                        Some(state)
                    } else {
                        None
                    }
                }
                None => {
                    let mut state = BundleState::new();
                    state.push(issuer, elements, bytes);
                    if state.accumulated_elements >= threshold {
                        Some(state)
                    } else {
                        let bundles_arc = Arc::clone(&self.bundles);
                        let key_clone = key.clone();
                        let inner_for_timer = self.inner.clone();
                        let descriptor_for_timer = Arc::clone(&self.descriptor);
                        let listeners_for_timer = self.event_listeners.clone();
                        let name_for_timer = self.name.clone();
                        let permits_for_timer = Arc::clone(&self.in_flight);

                        let handle = self.scheduler.schedule(
                            self.settings.delay_threshold,
                            Box::new(move || {
                                let maybe_state = bundles_arc.lock().remove(&key_clone);
                                if let Some(state) = maybe_state {
                                    tokio::spawn(async move {
                                        let _permit = permits_for_timer.acquire_owned().await.expect("bundle semaphore never closes");
                                        let mut svc = inner_for_timer;
                                        flush(
                                            descriptor_for_timer.as_ref(),
                                            &mut svc,
                                            state,
                                            &listeners_for_timer,
                                            &name_for_timer,
                                            FlushTrigger::Delay,
                                        )
                                        .await;
                                    });
                                }
                            }),
                        );
                        state.flush_handle = Some(handle);
                        bundles.insert(key, state);
                        None
                    }
                }
            }
        };

        if let Some(state) = detached {
            // Detach the flush itself so the submitter that tripped the
            // threshold never blocks on the semaphore like a later waiter
            // would; it only awaits its own result below.
            let mut svc = self.inner.clone();
            let descriptor = Arc::clone(&self.descriptor);
            let listeners = self.event_listeners.clone();
            let name = self.name.clone();
            let permits = Arc::clone(&self.in_flight);

            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.expect("bundle semaphore never closes");
                #[cfg(feature = "tracing")]
                debug!(bundle = %name, "element-count threshold reached, flushing inline");
                flush(descriptor.as_ref(), &mut svc, state, &listeners, &name, FlushTrigger::ElementCount).await;
            });
        }

        Box::pin(async move { await_issuer(rx).await })
    }
}

async fn await_issuer<Resp>(rx: oneshot::Receiver<Result<Resp, ApiException>>) -> Result<Resp, ApiException> {
    rx.await.unwrap_or_else(|_| {
        Err(ApiException::new(
            rpc_callable_core::StatusCode::Unknown,
            "bundle flush dropped its issuer sender without a response",
        ))
    })
}
