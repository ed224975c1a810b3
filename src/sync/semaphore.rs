// SPDX-License-Identifier: MIT

use crate::sync::lock;
use std::sync::{Condvar, Mutex};

/// Counting semaphore handing out concurrency tokens.
pub struct Semaphore {
    /// Number of tokens currently available.
    available: Mutex<usize>,
    /// Signalled whenever a token is returned.
    token_returned: Condvar,
    /// Total number of tokens.
    capacity: usize,
}

/// A held token. Returned to the semaphore when dropped.
pub struct Permit<'a> {
    semaphore: &'a Semaphore,
}

impl Semaphore {
    /// Creates a semaphore with `capacity` tokens, all available.
    pub fn new(capacity: usize) -> Self {
        Semaphore {
            available: Mutex::new(capacity),
            token_returned: Condvar::new(),
            capacity,
        }
    }

    /// Number of tokens not currently held.
    #[cfg(test)]
    fn available(&self) -> usize {
        *lock(&self.available)
    }

    /// Blocks until a token is available and takes it.
    pub fn acquire(&self) -> Permit<'_> {
        let mut available = lock(&self.available);
        while *available == 0 {
            available = self
                .token_returned
                .wait(available)
                .unwrap_or_else(|e| e.into_inner());
        }
        *available -= 1;
        Permit { semaphore: self }
    }

    /// Takes a token if one is available right now.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut available = lock(&self.available);
        if *available == 0 {
            return None;
        }
        *available -= 1;
        Some(Permit { semaphore: self })
    }

    fn release(&self) {
        let mut available = lock(&self.available);
        debug_assert!(*available < self.capacity);
        *available += 1;
        self.token_returned.notify_one();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}
