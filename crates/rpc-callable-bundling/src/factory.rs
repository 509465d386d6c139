//! [`BundlerFactory`]: constructs and caches bundling services, and owns
//! their collective lifecycle.

use crate::config::{BundlingDescriptor, BundlingSettings};
use crate::events::BundleEvent;
use crate::service::BundlingService;
use futures::future::join_all;
use rpc_callable_core::{ApiException, EventListeners, Scheduler, StatusCode};
use std::collections::HashMap as StdHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::Service;

/// Caches one [`BundlingService`] per name and owns their shared close.
///
/// Repeated calls to [`bundler`](Self::bundler) for the same name return the
/// same underlying service, so submissions issued from different call sites
/// still share one partition map and flush together.
pub struct BundlerFactory<S, D, Req, Resp>
where
    D: BundlingDescriptor<Req, Resp>,
{
    inner: S,
    descriptor: Arc<D>,
    settings: BundlingSettings,
    scheduler: Arc<dyn Scheduler>,
    event_listeners: EventListeners<BundleEvent>,
    bundlers: Mutex<StdHashMap<String, BundlingService<S, D, Req, Resp>>>,
    closed: AtomicBool,
}

impl<S, D, Req, Resp> BundlerFactory<S, D, Req, Resp>
where
    D: BundlingDescriptor<Req, Resp>,
{
    pub fn new(inner: S, descriptor: D, settings: BundlingSettings, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            inner,
            descriptor: Arc::new(descriptor),
            settings,
            scheduler,
            event_listeners: EventListeners::new(),
            bundlers: Mutex::new(StdHashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&BundleEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(rpc_callable_core::FnListener::new(f));
        self
    }

    /// Returns the bundler registered under `name`, constructing it on
    /// first use. `name` is typically the RPC method the bundler fronts.
    ///
    /// Fails once [`close_all`](Self::close_all) has run: no bundler, new or
    /// cached, is handed out for further submission afterward.
    pub fn bundler(&self, name: &str) -> Result<BundlingService<S, D, Req, Resp>, ApiException>
    where
        S: Clone + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ApiException::new(
                StatusCode::FailedPrecondition,
                "bundler factory closed: no further submissions permitted",
            ));
        }
        let mut bundlers = self.bundlers.lock().expect("bundler registry poisoned");
        if let Some(existing) = bundlers.get(name) {
            return Ok(existing.clone());
        }
        let service = BundlingService::new(
            self.inner.clone(),
            Arc::clone(&self.descriptor),
            self.settings,
            Arc::clone(&self.scheduler),
            self.event_listeners.clone(),
            name.to_string(),
        );
        bundlers.insert(name.to_string(), service.clone());
        Ok(service)
    }
}

impl<S, D, Req, Resp> BundlerFactory<S, D, Req, Resp>
where
    S: Service<Req, Response = Resp, Error = ApiException> + Clone + Send + 'static,
    S::Future: Send + 'static,
    D: BundlingDescriptor<Req, Resp> + Send + Sync + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Closes every bundler this factory has ever constructed, flushing all
    /// open bundles and waiting for every pending future to resolve. Also
    /// marks the factory itself closed, so [`bundler`](Self::bundler) stops
    /// handing out bundlers under names never seen before.
    pub async fn close_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let services: Vec<_> = {
            let bundlers = self.bundlers.lock().expect("bundler registry poisoned");
            bundlers.values().cloned().collect()
        };
        join_all(services.iter().map(|s| s.close())).await;
    }
}
