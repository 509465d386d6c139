//! [`BundlingSettings`] and the [`BundlingDescriptor`] strategy trait.

use rpc_callable_core::ApiException;
use std::hash::Hash;
use std::time::Duration;

/// Immutable configuration for a bundler.
///
/// `blocking_call_count_threshold == 0` means unlimited in-flight flushes:
/// submitters that trigger a flush never block waiting for a slot.
#[derive(Debug, Clone, Copy)]
pub struct BundlingSettings {
    pub element_count_threshold: usize,
    pub delay_threshold: Duration,
    pub blocking_call_count_threshold: usize,
    pub is_enabled: bool,
}

impl BundlingSettings {
    /// Starts a builder with a 100ms delay threshold, bundling enabled, and
    /// no element-count or blocking-call-count limits (both must be set
    /// explicitly to turn on flush-by-size or backpressure).
    pub fn builder() -> BundlingSettingsBuilder {
        BundlingSettingsBuilder::new()
    }
}

/// Builder for [`BundlingSettings`].
pub struct BundlingSettingsBuilder {
    element_count_threshold: usize,
    delay_threshold: Duration,
    blocking_call_count_threshold: usize,
    is_enabled: bool,
}

impl Default for BundlingSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BundlingSettingsBuilder {
    pub fn new() -> Self {
        Self {
            element_count_threshold: usize::MAX,
            delay_threshold: Duration::from_millis(100),
            blocking_call_count_threshold: 0,
            is_enabled: true,
        }
    }

    pub fn element_count_threshold(mut self, n: usize) -> Self {
        self.element_count_threshold = n;
        self
    }

    pub fn delay_threshold(mut self, d: Duration) -> Self {
        self.delay_threshold = d;
        self
    }

    pub fn blocking_call_count_threshold(mut self, n: usize) -> Self {
        self.blocking_call_count_threshold = n;
        self
    }

    pub fn is_enabled(mut self, enabled: bool) -> Self {
        self.is_enabled = enabled;
        self
    }

    pub fn build(self) -> BundlingSettings {
        BundlingSettings {
            element_count_threshold: self.element_count_threshold,
            delay_threshold: self.delay_threshold,
            blocking_call_count_threshold: self.blocking_call_count_threshold,
            is_enabled: self.is_enabled,
        }
    }
}

/// Stateless strategy consulted by the bundling decorator.
///
/// Descriptors carry no hidden state and are safe to share across every
/// bundle a bundler ever opens; implementations are expected to be pure
/// functions of their inputs.
pub trait BundlingDescriptor<Req, Resp>: Send + Sync {
    /// The partition key type. Requests with equal keys may share a bundle;
    /// requests with distinct keys never do.
    type Key: Hash + Eq + Clone + Send + Sync + 'static;

    /// Returns the partition key for `req`.
    fn bundle_partition_key(&self, req: &Req) -> Self::Key;

    /// Returns the number of logical elements `req` contributes, used to
    /// evaluate `element_count_threshold`.
    fn count_elements(&self, req: &Req) -> usize;

    /// Returns the number of bytes `req` contributes. Exposed for
    /// observability; no threshold in [`BundlingSettings`] consumes it
    /// directly.
    fn count_bytes(&self, req: &Req) -> usize;

    /// Merges same-partition requests, in submission order, into a single
    /// request to issue to the inner callable.
    fn merge_requests(&self, requests: &[Req]) -> Req;

    /// Splits a successful merged response back into one response per
    /// originating request, in the same order as `requests`.
    fn split_response(&self, response: Resp, requests: &[Req]) -> Vec<Resp>;

    /// Splits a merged-call failure across every originating request.
    ///
    /// Default: the same failure is propagated to every issuer, which is
    /// the common case; override for descriptors that can partially
    /// attribute a failure.
    fn split_exception(&self, error: &ApiException, count: usize) -> Vec<ApiException> {
        (0..count).map(|_| error.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_disable_element_count_and_blocking_thresholds() {
        let settings = BundlingSettings::builder().build();
        assert_eq!(settings.element_count_threshold, usize::MAX);
        assert_eq!(settings.blocking_call_count_threshold, 0);
        assert!(settings.is_enabled);
    }

    #[test]
    fn builder_overrides_apply() {
        let settings = BundlingSettings::builder()
            .element_count_threshold(2)
            .delay_threshold(Duration::from_millis(5))
            .blocking_call_count_threshold(4)
            .is_enabled(false)
            .build();
        assert_eq!(settings.element_count_threshold, 2);
        assert_eq!(settings.delay_threshold, Duration::from_millis(5));
        assert_eq!(settings.blocking_call_count_threshold, 4);
        assert!(!settings.is_enabled);
    }
}
