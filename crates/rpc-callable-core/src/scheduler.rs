//! Scheduler abstraction: the injectable timer used to defer retry sleeps
//! and bundling flush timers. Production binds to a real timer thread; tests
//! bind to a recording scheduler that makes retry backoff deterministic and
//! lets bundling tests drive delay-threshold flushes explicitly.

use crate::clock::FakeClock;
use futures::future::{self, BoxFuture};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A handle to a scheduled (but not yet fired) action.
///
/// Cancelling a handle after the action has already run is a no-op; this
/// mirrors §5's "best-effort" cancellation stance for deferred work.
pub struct ScheduledHandle {
    cancelled: Arc<AtomicBool>,
}

impl ScheduledHandle {
    fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self { cancelled }
    }

    /// Requests cancellation of the scheduled action.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if this handle has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// An injectable timer service.
///
/// Two operations: [`Scheduler::sleep`], an awaitable delay used by the
/// retry decorator's sequential backoff loop, and [`Scheduler::schedule`], a
/// fire-and-forget deferred action used by the bundling decorator's
/// delay-threshold flush.
pub trait Scheduler: Send + Sync {
    /// Returns a future that resolves after approximately `dur` has
    /// elapsed.
    fn sleep(&self, dur: Duration) -> BoxFuture<'static, ()>;

    /// Schedules `action` to run after `dur` has elapsed, unless the
    /// returned handle is cancelled first.
    fn schedule(&self, dur: Duration, action: Box<dyn FnOnce() + Send>) -> ScheduledHandle;
}

/// Production scheduler backed by `tokio::time`.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler;

impl TokioScheduler {
    /// Creates a new Tokio-backed scheduler.
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for TokioScheduler {
    fn sleep(&self, dur: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(dur))
    }

    fn schedule(&self, dur: Duration, action: Box<dyn FnOnce() + Send>) -> ScheduledHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle_cancelled = Arc::clone(&cancelled);
        tokio::spawn(async move {
            tokio::time::sleep(dur).await;
            if !handle_cancelled.load(Ordering::SeqCst) {
                action();
            }
        });
        ScheduledHandle::new(cancelled)
    }
}

/// Deterministic scheduler for tests.
///
/// [`Scheduler::sleep`] advances the injected [`FakeClock`] synchronously and
/// records the requested duration, then resolves immediately — this is the
/// contract the retry decorator's tests assert against (spec.md §8,
/// "Observability hook"). [`Scheduler::schedule`] instead advances nothing
/// and queues the action; a test drives bundling's delay-threshold flush by
/// calling [`RecordingScheduler::fire_pending`].
#[derive(Default)]
pub struct RecordingScheduler {
    clock: Arc<FakeClock>,
    recorded_sleeps: Mutex<Vec<Duration>>,
    pending: Mutex<Vec<(Arc<AtomicBool>, Box<dyn FnOnce() + Send>)>>,
}

impl RecordingScheduler {
    /// Creates a new recording scheduler sharing the given clock.
    pub fn new(clock: Arc<FakeClock>) -> Self {
        Self {
            clock,
            recorded_sleeps: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Returns the durations passed to every [`Scheduler::sleep`] call so
    /// far, in order.
    pub fn recorded_sleeps(&self) -> Vec<Duration> {
        self.recorded_sleeps.lock().unwrap().clone()
    }

    /// Runs every still-pending, non-cancelled scheduled action.
    ///
    /// Simulates a delay-threshold timer firing without modeling individual
    /// per-action remaining time; sufficient for the bundling tests, which
    /// only need "has the deferred flush fired yet" control.
    pub fn fire_pending(&self) {
        let pending = std::mem::take(&mut *self.pending.lock().unwrap());
        for (cancelled, action) in pending {
            if !cancelled.load(Ordering::SeqCst) {
                action();
            }
        }
    }

    /// Returns the number of scheduled actions awaiting [`Self::fire_pending`].
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

impl Scheduler for RecordingScheduler {
    fn sleep(&self, dur: Duration) -> BoxFuture<'static, ()> {
        self.recorded_sleeps.lock().unwrap().push(dur);
        self.clock.advance(dur);
        Box::pin(future::ready(()))
    }

    fn schedule(&self, dur: Duration, action: Box<dyn FnOnce() + Send>) -> ScheduledHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.pending
            .lock()
            .unwrap()
            .push((Arc::clone(&cancelled), action));
        let _ = dur;
        ScheduledHandle::new(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn recording_scheduler_sleep_is_immediate_and_recorded() {
        let scheduler = RecordingScheduler::new(Arc::new(FakeClock::new()));
        scheduler.sleep(Duration::from_millis(50)).await;
        scheduler.sleep(Duration::from_millis(75)).await;
        assert_eq!(
            scheduler.recorded_sleeps(),
            vec![Duration::from_millis(50), Duration::from_millis(75)]
        );
    }

    #[test]
    fn recording_scheduler_schedule_defers_until_fired() {
        let scheduler = RecordingScheduler::new(Arc::new(FakeClock::new()));
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        scheduler.schedule(Duration::from_millis(10), Box::new(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_count(), 1);

        scheduler.fire_pending();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn cancelled_schedule_does_not_fire() {
        let scheduler = RecordingScheduler::new(Arc::new(FakeClock::new()));
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let handle = scheduler.schedule(Duration::from_millis(10), Box::new(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));
        handle.cancel();
        scheduler.fire_pending();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tokio_scheduler_schedule_fires_after_delay() {
        tokio::time::pause();
        let scheduler = TokioScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        scheduler.schedule(Duration::from_millis(20), Box::new(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));
        tokio::time::advance(Duration::from_millis(25)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
