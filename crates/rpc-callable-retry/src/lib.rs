//! Retrying decorator for rpc-callable.
//!
//! Wraps a unary callable so that classifiable, retry-eligible failures are
//! automatically re-issued under an exponential backoff schedule, bounded by
//! a total timeout across every attempt and every sleep. See spec.md §4.3
//! for the exact algorithm this implements.
//!
//! # Example
//!
//! ```
//! use rpc_callable_core::{CallContext, StatusCode, ClassifiableError};
//! use rpc_callable_retry::{RetryConfigBuilder, RetryableCodes, RetryingLayer, RetrySettings};
//! use tower::{Layer, Service, ServiceExt, service_fn};
//!
//! #[derive(Debug, Clone)]
//! struct MyError(StatusCode);
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{}", self.0)
//!     }
//! }
//! impl std::error::Error for MyError {}
//! impl ClassifiableError for MyError {
//!     fn status_code(&self) -> StatusCode { self.0 }
//!     fn classify_message(&self) -> String { self.to_string() }
//! }
//!
//! # async fn example() {
//! let config = RetryConfigBuilder::<String>::new()
//!     .settings(RetrySettings::exponential_backoff().build())
//!     .retryable_codes(RetryableCodes::of([StatusCode::Unavailable]))
//!     .build();
//! let layer = RetryingLayer::new(config);
//!
//! let mut service = layer.layer(service_fn(|(req, _ctx): (String, CallContext)| async move {
//!     Ok::<_, MyError>(format!("hello {req}"))
//! }));
//!
//! let (resp, _ctx) = (String::new(), CallContext::new());
//! let _ = service.ready().await.unwrap().call((resp, _ctx)).await;
//! # }
//! ```

mod budget;
mod config;
mod events;
mod layer;

pub use budget::{AimdBudget, AimdBudgetBuilder, RetryBudget, RetryBudgetBuilder, TokenBucketBuilder, TokenBucketBudget};
pub use config::{RetryConfig, RetryConfigBuilder, RetryableCodes, RetrySettings, RetrySettingsBuilder};
pub use events::RetryEvent;
pub use layer::RetryingLayer;

use futures::future::BoxFuture;
use rpc_callable_core::{ApiException, CallContext, ClassifiableError, StatusCode};
use std::error::Error as StdError;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::Service;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

/// A [`tower::Service`] that retries a unary callable per spec.md §4.3.
///
/// Built by [`RetryingLayer`], never constructed directly.
pub struct RetryingService<S, Req> {
    inner: S,
    config: Arc<RetryConfig<Req>>,
}

impl<S, Req> RetryingService<S, Req> {
    pub(crate) fn new(inner: S, config: Arc<RetryConfig<Req>>) -> Self {
        #[cfg(feature = "metrics")]
        {
            describe_counter!(
                "retry_calls_total",
                "Total number of retry-wrapped calls (success or exhausted)"
            );
            describe_counter!("retry_attempts_total", "Total number of retry attempts issued");
            describe_histogram!("retry_attempts", "Number of attempts per completed call");
        }
        Self { inner, config }
    }
}

impl<S, Req> Clone for RetryingService<S, Req>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, Req, Resp, E> Service<(Req, CallContext)> for RetryingService<S, Req>
where
    S: Service<(Req, CallContext), Response = Resp, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    Resp: Send + 'static,
    E: ClassifiableError + StdError + Send + Sync + 'static,
{
    type Response = Resp;
    type Error = ApiException;
    type Future = BoxFuture<'static, Result<Resp, ApiException>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.inner.poll_ready(cx) {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
            Poll::Ready(Err(e)) => {
                Poll::Ready(Err(ApiException::from_source(e.status_code(), e.classify_message(), e)))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn call(&mut self, (req, ctx): (Req, CallContext)) -> Self::Future {
        let mut service = self.inner.clone();
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let settings = &config.settings;
            let start_nanos = config.clock.now_nanos();
            let total_deadline_nanos = start_nanos + settings.total_timeout.as_nanos() as u64;
            let real_total_deadline = Instant::now() + settings.total_timeout;

            let mut delay = settings.initial_retry_delay;
            let mut per_attempt_timeout = settings.initial_rpc_timeout;
            let mut attempt = 0usize;

            loop {
                let attempt_deadline = (Instant::now() + per_attempt_timeout).min(real_total_deadline);
                let attempt_ctx = ctx.with_deadline(attempt_deadline);

                match service.call((req.clone(), attempt_ctx)).await {
                    Ok(response) => {
                        if let Some(budget) = &config.budget {
                            budget.deposit();
                        }

                        #[cfg(feature = "metrics")]
                        {
                            counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "success")
                                .increment(1);
                            histogram!("retry_attempts", "retry" => config.name.clone())
                                .record((attempt + 1) as f64);
                        }
                        #[cfg(feature = "tracing")]
                        debug!(retry = %config.name, attempts = attempt + 1, "call succeeded");

                        config.event_listeners.emit(&RetryEvent::Success {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt + 1,
                        });
                        return Ok(response);
                    }
                    Err(error) => {
                        let code = error.status_code();
                        let message = error.classify_message();

                        if !config.retryable_codes.contains(code) && code != StatusCode::DeadlineExceeded {
                            #[cfg(feature = "tracing")]
                            debug!(retry = %config.name, code = %code, "non-retryable code, failing immediately");

                            config.event_listeners.emit(&RetryEvent::IgnoredError {
                                pattern_name: config.name.clone(),
                                timestamp: Instant::now(),
                                code,
                            });
                            return Err(ApiException::from_source(code, message, error));
                        }

                        let sleep_duration = if code == StatusCode::DeadlineExceeded {
                            Duration::ZERO
                        } else {
                            delay
                        };

                        let now_nanos = config.clock.now_nanos();
                        if now_nanos + sleep_duration.as_nanos() as u64 >= total_deadline_nanos {
                            #[cfg(feature = "metrics")]
                            counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "exhausted")
                                .increment(1);
                            #[cfg(feature = "tracing")]
                            warn!(retry = %config.name, attempts = attempt + 1, "retries exhausted at total timeout");

                            config.event_listeners.emit(&RetryEvent::Error {
                                pattern_name: config.name.clone(),
                                timestamp: Instant::now(),
                                attempts: attempt + 1,
                                code,
                            });
                            return Err(ApiException::from_source(code, message, error));
                        }

                        if let Some(budget) = &config.budget {
                            if !budget.try_withdraw() {
                                #[cfg(feature = "tracing")]
                                warn!(retry = %config.name, attempt = attempt + 1, "retry budget exhausted");

                                config.event_listeners.emit(&RetryEvent::BudgetExhausted {
                                    pattern_name: config.name.clone(),
                                    timestamp: Instant::now(),
                                    attempt: attempt + 1,
                                });
                                return Err(ApiException::from_source(code, message, error));
                            }
                        }

                        #[cfg(feature = "metrics")]
                        counter!("retry_attempts_total", "retry" => config.name.clone()).increment(1);
                        #[cfg(feature = "tracing")]
                        debug!(retry = %config.name, attempt = attempt + 1, delay_ms = sleep_duration.as_millis(), code = %code, "retrying after sleep");

                        config.event_listeners.emit(&RetryEvent::Retry {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempt,
                            delay: sleep_duration,
                            code,
                        });

                        config.scheduler.sleep(sleep_duration).await;
                        delay = Duration::from_secs_f64(
                            (delay.as_secs_f64() * settings.retry_delay_multiplier)
                                .min(settings.max_retry_delay.as_secs_f64()),
                        );
                        per_attempt_timeout = Duration::from_secs_f64(
                            (per_attempt_timeout.as_secs_f64() * settings.rpc_timeout_multiplier)
                                .min(settings.max_rpc_timeout.as_secs_f64()),
                        );
                        attempt += 1;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc_callable_core::{FakeClock, RecordingScheduler};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::{Layer, ServiceExt, service_fn};

    #[derive(Debug, Clone)]
    struct CodedError {
        code: StatusCode,
        message: String,
    }

    impl std::fmt::Display for CodedError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.message)
        }
    }
    impl StdError for CodedError {}
    impl ClassifiableError for CodedError {
        fn status_code(&self) -> StatusCode {
            self.code
        }
        fn classify_message(&self) -> String {
            self.message.clone()
        }
    }

    fn test_layer(
        retryable: RetryableCodes,
    ) -> (RetryingLayer<String>, Arc<RecordingScheduler>) {
        let clock = Arc::new(FakeClock::new());
        let scheduler = Arc::new(RecordingScheduler::new(Arc::clone(&clock)));
        let config = RetryConfigBuilder::<String>::new()
            .settings(
                RetrySettings::builder()
                    .initial_retry_delay(Duration::from_millis(10))
                    .max_retry_delay(Duration::from_millis(100))
                    .total_timeout(Duration::from_secs(10))
                    .build(),
            )
            .retryable_codes(retryable)
            .scheduler(scheduler.clone() as Arc<dyn rpc_callable_core::Scheduler>)
            .clock(clock as Arc<dyn rpc_callable_core::Clock>)
            .build();
        (RetryingLayer::new(config), scheduler)
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let (layer, _scheduler) = test_layer(RetryableCodes::of([StatusCode::Unavailable]));

        let svc = service_fn(move |(req, _ctx): (i32, CallContext)| {
            let calls = Arc::clone(&calls2);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(CodedError { code: StatusCode::Unavailable, message: "unavailable".into() })
                } else {
                    Ok(req + 1)
                }
            }
        });
        let mut service = layer.layer(svc);
        let result = service.ready().await.unwrap().call((1, CallContext::new())).await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn non_retryable_code_fails_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let (layer, _scheduler) = test_layer(RetryableCodes::of([StatusCode::Unknown]));

        let svc = service_fn(move |(_req, _ctx): (i32, CallContext)| {
            let calls = Arc::clone(&calls2);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(CodedError {
                    code: StatusCode::FailedPrecondition,
                    message: "foobar".into(),
                })
            }
        });
        let mut service = layer.layer(svc);
        let err = service
            .ready()
            .await
            .unwrap()
            .call((1, CallContext::new()))
            .await
            .unwrap_err();
        assert_eq!(err.code, StatusCode::FailedPrecondition);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn opaque_error_classified_as_unknown() {
        let (layer, _scheduler) = test_layer(RetryableCodes::of([StatusCode::Unknown]));
        let svc = service_fn(|(_req, _ctx): (i32, CallContext)| async {
            Err::<i32, _>(CodedError {
                code: StatusCode::Unknown,
                message: "foobar".into(),
            })
        });
        let mut service = layer.layer(svc);
        let err = service
            .ready()
            .await
            .unwrap()
            .call((1, CallContext::new()))
            .await
            .unwrap_err();
        assert_eq!(err.code, StatusCode::Unknown);
        assert!(err.message.contains("foobar"));
    }

    #[tokio::test]
    async fn deadline_exceeded_sleeps_zero_duration() {
        let (layer, scheduler) = test_layer(RetryableCodes::none());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let svc = service_fn(move |(req, _ctx): (i32, CallContext)| {
            let calls = Arc::clone(&calls2);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(CodedError { code: StatusCode::DeadlineExceeded, message: "timeout".into() })
                } else {
                    Ok(req)
                }
            }
        });
        let mut service = layer.layer(svc);
        let result = service.ready().await.unwrap().call((9, CallContext::new())).await;
        assert_eq!(result.unwrap(), 9);
        assert_eq!(scheduler.recorded_sleeps(), vec![Duration::ZERO]);
    }

    #[tokio::test]
    async fn exhausts_at_total_timeout() {
        let clock = Arc::new(FakeClock::new());
        let scheduler = Arc::new(RecordingScheduler::new(Arc::clone(&clock)));
        let config = RetryConfigBuilder::<i32>::new()
            .settings(
                RetrySettings::builder()
                    .initial_retry_delay(Duration::from_millis(100))
                    .max_retry_delay(Duration::from_millis(100))
                    .total_timeout(Duration::from_millis(250))
                    .build(),
            )
            .retryable_codes(RetryableCodes::of([StatusCode::Unavailable]))
            .scheduler(scheduler.clone() as Arc<dyn rpc_callable_core::Scheduler>)
            .clock(clock as Arc<dyn rpc_callable_core::Clock>)
            .build();
        let layer = RetryingLayer::new(config);

        let svc = service_fn(|(_req, _ctx): (i32, CallContext)| async {
            Err::<i32, _>(CodedError {
                code: StatusCode::Unavailable,
                message: "foobar".into(),
            })
        });
        let mut service = layer.layer(svc);
        let err = service
            .ready()
            .await
            .unwrap()
            .call((1, CallContext::new()))
            .await
            .unwrap_err();
        assert_eq!(err.code, StatusCode::Unavailable);
        assert!(err.message.contains("foobar"));
    }
}
