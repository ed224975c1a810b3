// SPDX-License-Identifier: MIT

//! Instrumented combine operations for observing backends from tests.

use parsum::Combine;
use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::thread;
use std::time::Duration;

/// Addition that tracks how many combines run at the same instant.
pub struct ConcurrencyProbe {
    /// Time each combine stays "in flight", to give overlaps a chance.
    hold: Duration,
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new(hold: Duration) -> Self {
        ConcurrencyProbe {
            hold,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Highest number of simultaneous combines observed.
    pub fn peak(&self) -> usize {
        self.peak.load(SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(SeqCst)
    }
}

impl Combine for ConcurrencyProbe {
    fn combine(&self, a: f64, b: f64) -> f64 {
        let now = self.current.fetch_add(1, SeqCst) + 1;
        self.peak.fetch_max(now, SeqCst);
        self.calls.fetch_add(1, SeqCst);
        thread::sleep(self.hold);
        self.current.fetch_sub(1, SeqCst);
        a + b
    }
}

/// Addition that checks both operands are equal.
///
/// Fed an all-ones array of power-of-two length, a correctly ordered
/// doubling reduction only ever combines two partial sums of the same
/// width. Reading a partial sum from an earlier or later round shows up
/// as a mismatch.
pub struct OrderingProbe {
    hold: Duration,
    violations: AtomicUsize,
    calls: AtomicUsize,
}

impl OrderingProbe {
    pub fn new(hold: Duration) -> Self {
        OrderingProbe {
            hold,
            violations: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn violations(&self) -> usize {
        self.violations.load(SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(SeqCst)
    }
}

impl Combine for OrderingProbe {
    fn combine(&self, a: f64, b: f64) -> f64 {
        self.calls.fetch_add(1, SeqCst);
        if a != b {
            self.violations.fetch_add(1, SeqCst);
        }
        thread::sleep(self.hold);
        a + b
    }
}

/// Addition that panics on one chosen call (1-indexed).
pub struct PanicOnCall {
    target: usize,
    calls: AtomicUsize,
}

impl PanicOnCall {
    pub fn new(target: usize) -> Self {
        PanicOnCall {
            target,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(SeqCst)
    }
}

impl Combine for PanicOnCall {
    fn combine(&self, a: f64, b: f64) -> f64 {
        let call = self.calls.fetch_add(1, SeqCst) + 1;
        if call == self.target {
            panic!("injected failure on call {call}");
        }
        a + b
    }
}
