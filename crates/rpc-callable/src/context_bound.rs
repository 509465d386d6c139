//! [`ContextBound`]: adapts a `(Req, CallContext)` callable into a plain
//! `Req` callable by fixing the context, so the paging and bundling
//! decorators (which only vary on `Req`) can stack on top of context
//! binding and retrying.

use futures::future::BoxFuture;
use rpc_callable_core::{ApiException, CallContext};
use std::marker::PhantomData;
use std::task::{Context, Poll};
use tower::{Service, ServiceExt};

pub(crate) struct ContextBound<S, Req> {
    inner: S,
    context: CallContext,
    _req: PhantomData<fn() -> Req>,
}

impl<S, Req> ContextBound<S, Req> {
    pub(crate) fn new(inner: S, context: CallContext) -> Self {
        Self {
            inner,
            context,
            _req: PhantomData,
        }
    }
}

impl<S, Req> Clone for ContextBound<S, Req>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            context: self.context.clone(),
            _req: PhantomData,
        }
    }
}

impl<S, Req, Resp> Service<Req> for ContextBound<S, Req>
where
    S: Service<(Req, CallContext), Response = Resp, Error = ApiException> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = Resp;
    type Error = ApiException;
    type Future = BoxFuture<'static, Result<Resp, ApiException>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let mut svc = self.inner.clone();
        let context = self.context.clone();
        Box::pin(async move { svc.ready().await?.call((req, context)).await })
    }
}
