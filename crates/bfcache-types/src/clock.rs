//! Monotonic time source.
//!
//! Cache expiry is a passive check against [`Clock::now`]. Pages hold an
//! `Rc<dyn Clock>` so tests can swap in a [`ManualClock`] and step time
//! forward explicitly.

use std::cell::Cell;
use std::ops::Add;
use std::time::{Duration, Instant};

/// A point on a monotonic timeline, measured from the clock's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MonotonicTime(Duration);

impl MonotonicTime {
    pub const ZERO: Self = Self(Duration::ZERO);

    pub fn from_duration(since_origin: Duration) -> Self {
        Self(since_origin)
    }

    pub fn since_origin(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for MonotonicTime {
    type Output = MonotonicTime;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

/// Source of monotonic timestamps.
pub trait Clock {
    fn now(&self) -> MonotonicTime;
}

/// Clock backed by [`Instant`].
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> MonotonicTime {
        MonotonicTime(self.origin.elapsed())
    }
}

/// Test clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step the clock forward. Time never moves backwards.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get().saturating_add(by));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> MonotonicTime {
        MonotonicTime(self.now.get())
    }
}
