//! [`UnaryApiCallable`]: the builder-style facade composing context binding,
//! retrying, paging, and bundling over a single primitive callable.

use crate::context_bound::ContextBound;
use futures::future::BoxFuture;
use rpc_callable_bundling::{BundlerFactory, BundlingDescriptor, BundlingService, BundlingSettings};
use rpc_callable_core::{ApiException, CallContext, Channel, Clock, Scheduler, TokioScheduler};
use rpc_callable_paging::{PageDescriptor, PagedListResponse};
use rpc_callable_retry::{RetryConfigBuilder, RetryableCodes, RetryingLayer, RetryingService, RetrySettings};
use std::error::Error as StdError;
use std::marker::PhantomData;
use std::sync::Arc;
use tower::{Layer, Service, ServiceExt};

/// A unary callable under construction: a primitive wrapped by whichever
/// decorators have been applied so far.
///
/// Every builder method consumes `self` and returns a new callable; nothing
/// is mutated in place, mirroring [`CallContext`]'s own `with_*` style.
pub struct UnaryApiCallable<S, Req> {
    inner: S,
    context: CallContext,
    retryable_codes: RetryableCodes,
    _req: PhantomData<fn() -> Req>,
}

impl<S, Req> UnaryApiCallable<S, Req> {
    /// Wraps a primitive callable — the leaf adapter that invokes the
    /// transport — with no channel, no retry, and an empty `CallContext`.
    pub fn create(primitive: S) -> Self {
        Self {
            inner: primitive,
            context: CallContext::new(),
            retryable_codes: RetryableCodes::none(),
            _req: PhantomData,
        }
    }

    /// Returns a callable that injects `channel` into every `CallContext` it
    /// builds, leaving `self` untouched.
    pub fn bind(mut self, channel: Channel) -> Self {
        self.context = self.context.with_channel(channel);
        self
    }

    /// Declares the set of status codes this callable's eventual
    /// [`retrying`](Self::retrying) call should treat as retry-eligible.
    pub fn retryable_on(mut self, codes: RetryableCodes) -> Self {
        self.retryable_codes = codes;
        self
    }
}

impl<S, Req, Resp, E> UnaryApiCallable<S, Req>
where
    S: Service<(Req, CallContext), Response = Resp, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
{
    /// Issues `request` through the current decorator stack, binding this
    /// callable's accumulated `CallContext`.
    pub async fn call(&self, request: Req) -> Result<Resp, E> {
        let mut service = self.inner.clone();
        let context = self.context.clone();
        service.ready().await?.call((request, context)).await
    }

    /// Like [`call`](Self::call), but returns a boxed future instead of
    /// borrowing `self` across an `.await`.
    pub fn future_call(&self, request: Req) -> BoxFuture<'static, Result<Resp, E>> {
        let mut service = self.inner.clone();
        let context = self.context.clone();
        Box::pin(async move { service.ready().await?.call((request, context)).await })
    }
}

impl<S, Req, Resp, E> UnaryApiCallable<S, Req>
where
    S: Service<(Req, CallContext), Response = Resp, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    Resp: Send + 'static,
    E: rpc_callable_core::ClassifiableError + StdError + Send + Sync + 'static,
{
    /// Wraps this callable with the retrying decorator, consuming whatever
    /// [`retryable_on`](Self::retryable_on) declared.
    pub fn retrying(
        self,
        settings: RetrySettings,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> UnaryApiCallable<RetryingService<S, Req>, Req> {
        let config = RetryConfigBuilder::<Req>::new()
            .settings(settings)
            .retryable_codes(self.retryable_codes)
            .scheduler(scheduler)
            .clock(clock)
            .build();
        let inner = RetryingLayer::new(config).layer(self.inner);
        UnaryApiCallable {
            inner,
            context: self.context,
            retryable_codes: RetryableCodes::none(),
            _req: PhantomData,
        }
    }
}

impl<S, Req, Resp> UnaryApiCallable<S, Req>
where
    S: Service<(Req, CallContext), Response = Resp, Error = rpc_callable_core::ApiException> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    Resp: Send + 'static,
{
    /// Turns this callable into one whose `.call(request)` synchronously
    /// returns a [`PagedListResponse`] bound to `request` and `descriptor`,
    /// rather than a single response.
    pub fn page_streaming<D, Elem>(self, descriptor: D) -> PageStreamingCallable<S, D, Req>
    where
        D: PageDescriptor<Req, Resp, Elem> + Clone,
    {
        PageStreamingCallable {
            service: ContextBound::new(self.inner, self.context),
            descriptor,
        }
    }

    /// Wraps this callable with the bundling decorator, returning a
    /// [`BundlingCallable`] backed by a [`BundlerFactory`] — bundling has no
    /// separate per-request context to bind after this point.
    pub fn bundling<D>(self, descriptor: D, settings: BundlingSettings) -> BundlingCallable<S, D, Req, Resp>
    where
        D: BundlingDescriptor<Req, Resp>,
    {
        let bound = ContextBound::new(self.inner, self.context);
        let factory = BundlerFactory::new(bound, descriptor, settings, Arc::new(TokioScheduler::new()));
        BundlingCallable {
            factory: Arc::new(factory),
        }
    }
}

/// Returned by [`UnaryApiCallable::bundling`]: the `bundlerFactory`
/// collaborator spec.md §6 names alongside the bundling descriptor, bound to
/// this callable's accumulated context and decorator stack.
///
/// Distinct names passed to [`bundler`](Self::bundler) share this factory's
/// settings and scheduler but accumulate and flush independently, matching
/// one factory fronting several RPC methods.
pub struct BundlingCallable<S, D, Req, Resp>
where
    D: BundlingDescriptor<Req, Resp>,
{
    factory: Arc<BundlerFactory<ContextBound<S, Req>, D, Req, Resp>>,
}

impl<S, D, Req, Resp> BundlingCallable<S, D, Req, Resp>
where
    S: Service<(Req, CallContext), Response = Resp, Error = ApiException> + Clone + Send + 'static,
    S::Future: Send + 'static,
    D: BundlingDescriptor<Req, Resp> + Send + Sync + 'static,
    Req: Clone + Send + 'static,
    Resp: Send + 'static,
{
    /// Returns the bundler registered under `name`, constructing it on
    /// first use. Fails once [`close_all`](Self::close_all) has run.
    pub fn bundler(&self, name: &str) -> Result<BundlingService<ContextBound<S, Req>, D, Req, Resp>, ApiException> {
        self.factory.bundler(name)
    }

    /// Closes every bundler this factory has constructed, flushing open
    /// bundles and rejecting further submissions under any name.
    pub async fn close_all(&self) {
        self.factory.close_all().await
    }
}

/// Returned by [`UnaryApiCallable::page_streaming`]: a callable whose
/// `.call(request)` performs no I/O itself, returning a lazy
/// [`PagedListResponse`] over the bound service and descriptor.
pub struct PageStreamingCallable<S, D, Req> {
    service: ContextBound<S, Req>,
    descriptor: D,
}

impl<S, D, Req, Resp, Elem> PageStreamingCallable<S, D, Req>
where
    S: Service<(Req, CallContext), Response = Resp, Error = rpc_callable_core::ApiException> + Clone + Send + 'static,
    S::Future: Send + 'static,
    D: PageDescriptor<Req, Resp, Elem> + Clone + Send + Sync + 'static,
    Req: Clone + Send + 'static,
    Resp: Send + 'static,
    Elem: Send + 'static,
{
    /// Builds the [`PagedListResponse`] that will fetch `request`'s pages on
    /// demand.
    pub fn call(&self, request: Req) -> PagedListResponse<ContextBound<S, Req>, D, Req, Resp, Elem> {
        PagedListResponse::new(self.service.clone(), self.descriptor.clone(), request)
    }
}
