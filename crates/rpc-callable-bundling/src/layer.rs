//! [`BundlingLayer`]: the `tower::Layer` that applies the bundling
//! decorator to a service.

use crate::config::{BundlingDescriptor, BundlingSettings};
use crate::events::BundleEvent;
use crate::service::BundlingService;
use rpc_callable_core::{EventListeners, FnListener, Scheduler, TokioScheduler};
use std::sync::Arc;
use tower_layer::Layer;

/// A `tower::Layer` that wraps a service with the bundling decorator.
///
/// # Example
///
/// ```
/// use rpc_callable_bundling::{BundlingDescriptor, BundlingLayer, BundlingSettings};
/// use rpc_callable_core::ApiException;
/// use tower::{Layer, Service, ServiceExt, service_fn};
///
/// struct SquareAll;
///
/// impl BundlingDescriptor<Vec<i32>, Vec<i32>> for SquareAll {
///     type Key = &'static str;
///     fn bundle_partition_key(&self, _req: &Vec<i32>) -> Self::Key { "one" }
///     fn count_elements(&self, req: &Vec<i32>) -> usize { req.len() }
///     fn count_bytes(&self, req: &Vec<i32>) -> usize { req.len() * 4 }
///     fn merge_requests(&self, requests: &[Vec<i32>]) -> Vec<i32> {
///         requests.iter().flatten().copied().collect()
///     }
///     fn split_response(&self, response: Vec<i32>, requests: &[Vec<i32>]) -> Vec<Vec<i32>> {
///         let mut out = Vec::new();
///         let mut rest = &response[..];
///         for req in requests {
///             let (head, tail) = rest.split_at(req.len());
///             out.push(head.to_vec());
///             rest = tail;
///         }
///         out
///     }
/// }
///
/// # async fn example() {
/// let layer = BundlingLayer::new(
///     SquareAll,
///     BundlingSettings::builder().element_count_threshold(2).build(),
/// );
/// let mut service = layer.layer(service_fn(|req: Vec<i32>| async move {
///     Ok::<_, ApiException>(req.iter().map(|n| n * n).collect::<Vec<_>>())
/// }));
/// let _ = service.ready().await.unwrap().call(vec![1, 2]).await;
/// # }
/// ```
pub struct BundlingLayer<D, Req, Resp>
where
    D: BundlingDescriptor<Req, Resp>,
{
    descriptor: Arc<D>,
    settings: BundlingSettings,
    scheduler: Arc<dyn Scheduler>,
    event_listeners: EventListeners<BundleEvent>,
    name: String,
    _phantom: std::marker::PhantomData<(Req, Resp)>,
}

impl<D, Req, Resp> BundlingLayer<D, Req, Resp>
where
    D: BundlingDescriptor<Req, Resp>,
{
    /// Creates a layer with a production `TokioScheduler` and no name.
    pub fn new(descriptor: D, settings: BundlingSettings) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            settings,
            scheduler: Arc::new(TokioScheduler::new()),
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
            _phantom: std::marker::PhantomData,
        }
    }

    /// Overrides the scheduler. Tests inject a `RecordingScheduler` here.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a listener invoked for every flush or exception fan-out.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&BundleEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }
}

impl<D, Req, Resp> Clone for BundlingLayer<D, Req, Resp>
where
    D: BundlingDescriptor<Req, Resp>,
{
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            settings: self.settings,
            scheduler: Arc::clone(&self.scheduler),
            event_listeners: self.event_listeners.clone(),
            name: self.name.clone(),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<S, D, Req, Resp> Layer<S> for BundlingLayer<D, Req, Resp>
where
    D: BundlingDescriptor<Req, Resp>,
{
    type Service = BundlingService<S, D, Req, Resp>;

    fn layer(&self, service: S) -> Self::Service {
        BundlingService::new(
            service,
            Arc::clone(&self.descriptor),
            self.settings,
            Arc::clone(&self.scheduler),
            self.event_listeners.clone(),
            self.name.clone(),
        )
    }
}
