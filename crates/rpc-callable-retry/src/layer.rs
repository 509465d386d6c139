use crate::config::RetryConfig;
use crate::RetryingService;
use std::sync::Arc;
use tower::Layer;

/// A [`tower::Layer`] that applies the retrying decorator to a service.
///
/// # Example
///
/// ```
/// use rpc_callable_retry::{RetryConfigBuilder, RetryingLayer};
/// use tower::Layer;
///
/// let config = RetryConfigBuilder::<String>::new().build();
/// let layer = RetryingLayer::new(config);
/// ```
#[derive(Clone)]
pub struct RetryingLayer<Req> {
    config: Arc<RetryConfig<Req>>,
}

impl<Req> RetryingLayer<Req> {
    /// Creates a new layer from a built [`RetryConfig`].
    pub fn new(config: RetryConfig<Req>) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S, Req> Layer<S> for RetryingLayer<Req> {
    type Service = RetryingService<S, Req>;

    fn layer(&self, service: S) -> Self::Service {
        RetryingService::new(service, Arc::clone(&self.config))
    }
}
