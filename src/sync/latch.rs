// SPDX-License-Identifier: MIT

use crate::sync::lock;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

/// Counting completion gate.
///
/// Starts at an initial count, grows with [`add_count`](Self::add_count) and
/// shrinks with [`signal`](Self::signal). Waiters are released once the count
/// reaches zero. A dispatcher typically starts the gate at 1 for itself, adds
/// one count per dispatched unit, then signals and waits.
pub struct CountdownLatch {
    /// Outstanding signals before the gate opens.
    remaining: Mutex<usize>,
    /// Notified when `remaining` drops to zero.
    reached_zero: Condvar,
}

/// Signals its latch exactly once, when dropped.
///
/// Moving a guard into a unit of work makes the signal fire on every exit
/// path, including a panic or the unit never being run at all.
pub struct LatchGuard {
    latch: Arc<CountdownLatch>,
}

impl CountdownLatch {
    pub fn new(initial: usize) -> Self {
        CountdownLatch {
            remaining: Mutex::new(initial),
            reached_zero: Condvar::new(),
        }
    }

    #[cfg(test)]
    fn count(&self) -> usize {
        *lock(&self.remaining)
    }

    /// Raises the count by one.
    pub fn add_count(&self) {
        let mut remaining = lock(&self.remaining);
        debug_assert!(*remaining > 0, "add_count on an open latch");
        *remaining += 1;
    }

    /// Lowers the count by one, opening the gate when it reaches zero.
    pub fn signal(&self) {
        let mut remaining = lock(&self.remaining);
        debug_assert!(*remaining > 0, "latch signalled past zero");
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.reached_zero.notify_all();
        }
    }

    /// Adds a count and returns a guard that signals it back on drop.
    pub fn guard(self: &Arc<Self>) -> LatchGuard {
        self.add_count();
        LatchGuard {
            latch: Arc::clone(self),
        }
    }

    /// Blocks until the count reaches zero.
    pub fn wait(&self) {
        let mut remaining = lock(&self.remaining);
        while *remaining != 0 {
            remaining = self
                .reached_zero
                .wait(remaining)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Blocks until the count reaches zero or `deadline` passes. Returns
    /// whether the gate opened.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut remaining = lock(&self.remaining);
        while *remaining != 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            remaining = match self
                .reached_zero
                .wait_timeout(remaining, deadline - now)
            {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.latch.signal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_opens_after_all_guards_drop() {
        let latch = Arc::new(CountdownLatch::new(1));
        let guards: Vec<LatchGuard> = (0..4).map(|_| latch.guard()).collect();
        assert_eq!(latch.count(), 5);

        for guard in guards {
            thread::spawn(move || drop(guard));
        }
        latch.signal();
        latch.wait();
        assert_eq!(latch.count(), 0);
    }

    #[test]
    fn test_guard_signals_when_unit_panics() {
        let latch = Arc::new(CountdownLatch::new(1));
        let guard = latch.guard();
        let worker = thread::spawn(move || {
            let _guard = guard;
            panic!("unit failed");
        });
        assert!(worker.join().is_err());
        latch.signal();
        assert!(latch.wait_until(Instant::now() + Duration::from_secs(5)));
    }

    #[test]
    fn test_wait_until_times_out() {
        let latch = CountdownLatch::new(1);
        let start = Instant::now();
        assert!(!latch.wait_until(start + Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(latch.count(), 1);
    }

    #[test]
    fn test_guard_signals_inside_catch_unwind() {
        let latch = Arc::new(CountdownLatch::new(1));
        let guard = latch.guard();
        let result = panic::catch_unwind(panic::AssertUnwindSafe(move || {
            let _guard = guard;
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(latch.count(), 1);
    }
}
