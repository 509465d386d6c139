//! Monotonic clock abstraction. Grounded on the `Clock` trait pattern used
//! by other circuit-breaker-style crates in this ecosystem: a thin
//! `Send + Sync + Debug` trait so timing can be faked in tests.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic nanosecond time source.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns nanoseconds elapsed since some arbitrary, implementation-defined
    /// epoch. Only differences between two calls are meaningful.
    fn now_nanos(&self) -> u64;
}

/// Production clock backed by [`std::time::Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_nanos(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
}

/// Synthetic clock for deterministic tests. Only advances when told to,
/// either directly via [`FakeClock::advance`] or indirectly through
/// [`crate::scheduler::RecordingScheduler`].
#[derive(Debug, Default)]
pub struct FakeClock {
    nanos: AtomicU64,
}

impl FakeClock {
    /// Creates a fake clock starting at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, duration: std::time::Duration) {
        self.nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fake_clock_only_advances_when_told() {
        let clock = FakeClock::new();
        assert_eq!(clock.now_nanos(), 0);
        clock.advance(Duration::from_millis(5));
        assert_eq!(clock.now_nanos(), 5_000_000);
    }
}
