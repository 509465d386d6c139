//! [`RetrySettings`], [`RetryableCodes`], and the config/builder pair that
//! [`crate::RetryingLayer`] wraps.

use crate::budget::RetryBudget;
use crate::events::RetryEvent;
use rpc_callable_core::{Clock, EventListeners, FnListener, Scheduler, StatusCode, SystemClock, TokioScheduler};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Immutable backoff and deadline configuration for the retrying decorator.
///
/// Invariants (checked by [`RetrySettingsBuilder::build`]): `initial_retry_delay
/// <= max_retry_delay`, `initial_rpc_timeout <= max_rpc_timeout`, and both
/// multipliers are `>= 1.0`.
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub retry_delay_multiplier: f64,
    pub initial_rpc_timeout: Duration,
    pub max_rpc_timeout: Duration,
    pub rpc_timeout_multiplier: f64,
    pub total_timeout: Duration,
}

impl RetrySettings {
    /// Starts a builder with the teacher's standard exponential-backoff
    /// defaults: 100ms initial delay growing to a 60s cap, matched by an
    /// identical per-attempt timeout schedule, bounded by a 10s total
    /// timeout.
    pub fn builder() -> RetrySettingsBuilder {
        RetrySettingsBuilder::new()
    }

    /// Preset: balanced exponential backoff suitable for most calls.
    pub fn exponential_backoff() -> RetrySettingsBuilder {
        RetrySettingsBuilder::new()
            .initial_retry_delay(Duration::from_millis(100))
            .max_retry_delay(Duration::from_secs(60))
            .retry_delay_multiplier(1.3)
            .initial_rpc_timeout(Duration::from_secs(1))
            .max_rpc_timeout(Duration::from_secs(10))
            .rpc_timeout_multiplier(1.3)
            .total_timeout(Duration::from_secs(10))
    }

    /// Preset: short initial delay and short total timeout, for
    /// latency-sensitive calls willing to give up quickly.
    pub fn aggressive() -> RetrySettingsBuilder {
        RetrySettingsBuilder::new()
            .initial_retry_delay(Duration::from_millis(10))
            .max_retry_delay(Duration::from_secs(1))
            .retry_delay_multiplier(1.5)
            .initial_rpc_timeout(Duration::from_millis(250))
            .max_rpc_timeout(Duration::from_secs(2))
            .rpc_timeout_multiplier(1.5)
            .total_timeout(Duration::from_secs(2))
    }

    /// Preset: long delays and a long total timeout, for calls against
    /// services that are already under load or rate-limited.
    pub fn conservative() -> RetrySettingsBuilder {
        RetrySettingsBuilder::new()
            .initial_retry_delay(Duration::from_millis(500))
            .max_retry_delay(Duration::from_secs(120))
            .retry_delay_multiplier(2.0)
            .initial_rpc_timeout(Duration::from_secs(5))
            .max_rpc_timeout(Duration::from_secs(30))
            .rpc_timeout_multiplier(2.0)
            .total_timeout(Duration::from_secs(60))
    }
}

/// Builder for [`RetrySettings`].
pub struct RetrySettingsBuilder {
    initial_retry_delay: Duration,
    max_retry_delay: Duration,
    retry_delay_multiplier: f64,
    initial_rpc_timeout: Duration,
    max_rpc_timeout: Duration,
    rpc_timeout_multiplier: f64,
    total_timeout: Duration,
}

impl Default for RetrySettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetrySettingsBuilder {
    /// Creates a builder seeded with [`RetrySettings::exponential_backoff`]'s
    /// numbers.
    pub fn new() -> Self {
        Self {
            initial_retry_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(60),
            retry_delay_multiplier: 1.3,
            initial_rpc_timeout: Duration::from_secs(1),
            max_rpc_timeout: Duration::from_secs(10),
            rpc_timeout_multiplier: 1.3,
            total_timeout: Duration::from_secs(10),
        }
    }

    pub fn initial_retry_delay(mut self, d: Duration) -> Self {
        self.initial_retry_delay = d;
        self
    }

    pub fn max_retry_delay(mut self, d: Duration) -> Self {
        self.max_retry_delay = d;
        self
    }

    pub fn retry_delay_multiplier(mut self, m: f64) -> Self {
        self.retry_delay_multiplier = m;
        self
    }

    pub fn initial_rpc_timeout(mut self, d: Duration) -> Self {
        self.initial_rpc_timeout = d;
        self
    }

    pub fn max_rpc_timeout(mut self, d: Duration) -> Self {
        self.max_rpc_timeout = d;
        self
    }

    pub fn rpc_timeout_multiplier(mut self, m: f64) -> Self {
        self.rpc_timeout_multiplier = m;
        self
    }

    pub fn total_timeout(mut self, d: Duration) -> Self {
        self.total_timeout = d;
        self
    }

    /// Validates the invariants and builds the immutable settings.
    ///
    /// # Panics
    ///
    /// Panics if `initial_retry_delay > max_retry_delay`, if
    /// `initial_rpc_timeout > max_rpc_timeout`, or if either multiplier is
    /// less than `1.0`. These are programmer errors in the configuration,
    /// not runtime conditions.
    pub fn build(self) -> RetrySettings {
        assert!(
            self.initial_retry_delay <= self.max_retry_delay,
            "initial_retry_delay must not exceed max_retry_delay"
        );
        assert!(
            self.initial_rpc_timeout <= self.max_rpc_timeout,
            "initial_rpc_timeout must not exceed max_rpc_timeout"
        );
        assert!(
            self.retry_delay_multiplier >= 1.0,
            "retry_delay_multiplier must be >= 1.0"
        );
        assert!(
            self.rpc_timeout_multiplier >= 1.0,
            "rpc_timeout_multiplier must be >= 1.0"
        );
        RetrySettings {
            initial_retry_delay: self.initial_retry_delay,
            max_retry_delay: self.max_retry_delay,
            retry_delay_multiplier: self.retry_delay_multiplier,
            initial_rpc_timeout: self.initial_rpc_timeout,
            max_rpc_timeout: self.max_rpc_timeout,
            rpc_timeout_multiplier: self.rpc_timeout_multiplier,
            total_timeout: self.total_timeout,
        }
    }
}

/// The set of abstract status codes treated as retry-eligible.
///
/// `DEADLINE_EXCEEDED` is always retry-eligible regardless of membership
/// (spec.md §4.3's classification rule); this set only governs every other
/// code.
#[derive(Debug, Clone, Default)]
pub struct RetryableCodes(HashSet<StatusCode>);

impl RetryableCodes {
    /// An empty set: only `DEADLINE_EXCEEDED` will ever be retried.
    pub fn none() -> Self {
        Self(HashSet::new())
    }

    /// Builds a set from an iterator of codes.
    pub fn of(codes: impl IntoIterator<Item = StatusCode>) -> Self {
        Self(codes.into_iter().collect())
    }

    /// Returns `true` if `code` is in this set.
    pub fn contains(&self, code: StatusCode) -> bool {
        self.0.contains(&code)
    }
}

/// Immutable configuration bundle backing a [`crate::RetryingLayer`].
pub struct RetryConfig<Req> {
    pub(crate) settings: RetrySettings,
    pub(crate) retryable_codes: RetryableCodes,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
    pub(crate) budget: Option<Arc<dyn RetryBudget>>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) _phantom: std::marker::PhantomData<Req>,
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder<Req> {
    settings: RetrySettings,
    retryable_codes: RetryableCodes,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
    budget: Option<Arc<dyn RetryBudget>>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    _phantom: std::marker::PhantomData<Req>,
}

impl<Req> Default for RetryConfigBuilder<Req> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req> RetryConfigBuilder<Req> {
    /// Creates a builder with `exponential_backoff()` settings, no retryable
    /// codes, no budget, and production scheduler/clock.
    pub fn new() -> Self {
        Self {
            settings: RetrySettings::exponential_backoff().build(),
            retryable_codes: RetryableCodes::none(),
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
            budget: None,
            scheduler: Arc::new(TokioScheduler::new()),
            clock: Arc::new(SystemClock::default()),
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn settings(mut self, settings: RetrySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn retryable_codes(mut self, codes: RetryableCodes) -> Self {
        self.retryable_codes = codes;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn budget(mut self, budget: Arc<dyn RetryBudget>) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Overrides the scheduler. Tests inject a `RecordingScheduler` here.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Overrides the clock. Tests inject a `FakeClock` here.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a listener invoked for every retry, success, or exhaustion
    /// event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    pub fn build(self) -> RetryConfig<Req> {
        RetryConfig {
            settings: self.settings,
            retryable_codes: self.retryable_codes,
            event_listeners: self.event_listeners,
            name: self.name,
            budget: self.budget,
            scheduler: self.scheduler,
            clock: self.clock,
            _phantom: std::marker::PhantomData,
        }
    }
}
