//! Time abstraction for sweeps and hold detection.
//!
//! The blade sleeps between animation steps and the input classifier polls
//! the button against a monotonic clock. Both go through `Clock` so tests can
//! substitute a clock that advances only when asked to.

use std::thread;
use std::time::{Duration, Instant};

/// A monotonic time source that can also block the current thread.
pub trait Clock {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Block for `duration`.
    fn sleep(&self, duration: Duration);

    /// Time elapsed since `earlier`, saturating at zero.
    fn since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

/// Wall-clock implementation backed by `Instant` and `thread::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}
