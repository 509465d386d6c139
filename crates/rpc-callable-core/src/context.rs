//! [`CallContext`]: the immutable per-invocation carrier.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Opaque, type-erased channel handle. The core never inspects it; a
/// transport adapter downcasts it back to its own concrete channel type.
pub type Channel = Arc<dyn Any + Send + Sync>;

/// Opaque, type-erased per-call transport options.
pub type CallOptions = Arc<dyn Any + Send + Sync>;

/// Immutable per-invocation parameters threaded through every decorator.
///
/// `CallContext` is cloned-with-overrides rather than mutated: every layer
/// that changes a field (e.g. the retry decorator narrowing the deadline per
/// attempt) does so by calling `with_*`, which returns a new context and
/// leaves the original untouched.
#[derive(Clone, Default)]
pub struct CallContext {
    channel: Option<Channel>,
    deadline: Option<Instant>,
    options: Option<CallOptions>,
}

impl CallContext {
    /// Creates an empty context with no channel, deadline, or options bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new context with the given channel bound, leaving `self`
    /// untouched.
    pub fn with_channel(&self, channel: Channel) -> Self {
        Self {
            channel: Some(channel),
            deadline: self.deadline,
            options: self.options.clone(),
        }
    }

    /// Returns a new context with the given deadline, leaving `self`
    /// untouched.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            channel: self.channel.clone(),
            deadline: Some(deadline),
            options: self.options.clone(),
        }
    }

    /// Returns a new context with the given transport options, leaving
    /// `self` untouched.
    pub fn with_options(&self, options: CallOptions) -> Self {
        Self {
            channel: self.channel.clone(),
            deadline: self.deadline,
            options: Some(options),
        }
    }

    /// The bound channel handle, if any.
    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    /// The bound deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The bound transport options, if any.
    pub fn options(&self) -> Option<&CallOptions> {
        self.options.as_ref()
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("channel_bound", &self.channel.is_some())
            .field("deadline", &self.deadline)
            .field("options_bound", &self.options.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn with_channel_does_not_mutate_original() {
        let base = CallContext::new();
        let bound = base.with_channel(Arc::new(42i32));
        assert!(base.channel().is_none());
        assert!(bound.channel().is_some());
        assert_eq!(
            *bound.channel().unwrap().downcast_ref::<i32>().unwrap(),
            42
        );
    }

    #[test]
    fn with_deadline_preserves_channel() {
        let base = CallContext::new().with_channel(Arc::new("chan"));
        let deadline = Instant::now() + Duration::from_secs(1);
        let with_deadline = base.with_deadline(deadline);
        assert_eq!(with_deadline.deadline(), Some(deadline));
        assert!(with_deadline.channel().is_some());
    }
}
