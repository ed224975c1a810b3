// SPDX-License-Identifier: MIT

use std::thread;
use std::time::Duration;

/// Default artificial latency of one combine step.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1);

/// Binary operation applied once per combine step of a reduction.
///
/// Implementations must be safe to call from many worker threads at once.
pub trait Combine: Send + Sync {
    fn combine(&self, a: f64, b: f64) -> f64;
}

/// Addition that blocks the calling thread before returning, standing in for
/// a unit of real work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayedAdd {
    delay: Duration,
}

impl DelayedAdd {
    pub fn new(delay: Duration) -> Self {
        DelayedAdd { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for DelayedAdd {
    fn default() -> Self {
        DelayedAdd::new(DEFAULT_DELAY)
    }
}

impl Combine for DelayedAdd {
    fn combine(&self, a: f64, b: f64) -> f64 {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        a + b
    }
}

/// Returns `a + b` after suspending the calling thread for `delay_millis`.
pub fn combine(a: f64, b: f64, delay_millis: u64) -> f64 {
    DelayedAdd::new(Duration::from_millis(delay_millis)).combine(a, b)
}
