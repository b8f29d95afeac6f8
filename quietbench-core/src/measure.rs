//! Wall-Clock Timing
//!
//! Samples are signed nanosecond counts so they can flow straight into the
//! temporal filter and distribution, which work on `i64`.

use std::time::Instant;

/// Timer for measuring benchmark iterations
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    #[inline(always)]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed nanoseconds since [`Timer::start`], saturating at `i64::MAX`
    #[inline(always)]
    pub fn stop(&self) -> i64 {
        i64::try_from(self.start.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}
