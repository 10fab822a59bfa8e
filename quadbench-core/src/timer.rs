//! Compute Timing
//!
//! Wall-clock timer wrapped around each estimator call. The monotonic clock
//! behind `std::time::Instant` cannot fail on supported platforms, so this
//! interface is infallible.

use std::time::Instant;

/// Timer for measuring one task's compute time.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    #[inline(always)]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and return elapsed nanoseconds.
    #[inline(always)]
    pub fn stop(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
}
