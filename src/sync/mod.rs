// SPDX-License-Identifier: MIT

//! Synchronization primitives the reduction backends are built from.

pub mod barrier;
pub mod latch;
pub mod pool;
pub mod semaphore;
pub mod task_queue;

use std::sync::{Mutex, MutexGuard};

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            mutex.clear_poison();
            poisoned.into_inner()
        }
    }
}
