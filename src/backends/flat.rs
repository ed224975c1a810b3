// SPDX-License-Identifier: MIT

//! One thread per element, all folding into a single locked accumulator.
//!
//! Not a tree reduction: combines happen one at a time under the lock, in
//! whatever order the threads get there. Any length is accepted.

use crate::backends::{Deadline, FirstFailure};
use crate::combine::Combine;
use crate::config::ReduceOptions;
use crate::error::{panic_message, ReduceError, Result};
use crate::sync::latch::CountdownLatch;
use crate::sync::lock;
use crate::sync::semaphore::Semaphore;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, warn};

/// Accumulator shared by every thread of one invocation.
struct FlatState {
    input: Vec<f64>,
    accumulator: Mutex<f64>,
    tokens: Semaphore,
    combine: Arc<dyn Combine>,
    failure: FirstFailure,
}

impl FlatState {
    /// Folds `input[index]` into the accumulator.
    fn absorb(&self, index: usize) {
        let _permit = self.tokens.acquire();
        let mut accumulator = lock(&self.accumulator);
        let current = *accumulator;
        let value = self.input[index];
        match panic::catch_unwind(AssertUnwindSafe(|| {
            self.combine.combine(current, value)
        })) {
            Ok(sum) => *accumulator = sum,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(index, error = %message, "combine panicked");
                self.failure.record(ReduceError::WorkerPanicked {
                    round: 0,
                    index,
                    message,
                });
            }
        }
    }
}

/// Sums `data` by spawning a thread for every element after the first.
///
/// The first element seeds the accumulator, so `n` elements cost `n - 1`
/// combines and an empty array sums to `0.0`. Failures report round `0`.
pub fn reduce(data: &[f64], options: &ReduceOptions) -> Result<f64> {
    if options.num_threads == 0 {
        return Err(ReduceError::ZeroThreads);
    }
    let Some(&first) = data.first() else {
        return Ok(0.0);
    };

    let state = Arc::new(FlatState {
        input: data.to_vec(),
        accumulator: Mutex::new(first),
        tokens: Semaphore::new(options.num_threads),
        combine: options.combine_op(),
        failure: FirstFailure::default(),
    });
    let deadline = Deadline::start(options.deadline);
    let latch = Arc::new(CountdownLatch::new(1));
    let mut spawn_error = None;

    debug!(threads = data.len() - 1, "spawning element threads");
    for index in 1..data.len() {
        // The guard signals even if the thread never starts.
        let done = latch.guard();
        let state = Arc::clone(&state);
        let spawned = thread::Builder::new().spawn(move || {
            let _done = done;
            state.absorb(index);
        });
        if let Err(source) = spawned {
            spawn_error = Some(source);
            break;
        }
    }

    latch.signal();
    deadline.wait(&latch, 0)?;
    if let Some(source) = spawn_error {
        return Err(ReduceError::Spawn { source });
    }
    state.failure.check()?;

    let sum = *lock(&state.accumulator);
    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn options(threads: usize) -> ReduceOptions {
        ReduceOptions::with_threads(threads).delay(Duration::ZERO)
    }

    #[test]
    fn test_sums_any_length() {
        let data: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(reduce(&data, &options(4)).unwrap(), 55.0);
    }

    #[test]
    fn test_trivial_inputs() {
        assert_eq!(reduce(&[], &options(2)).unwrap(), 0.0);
        assert_eq!(reduce(&[3.5], &options(2)).unwrap(), 3.5);
    }

    #[test]
    fn test_rejects_zero_threads() {
        assert!(matches!(
            reduce(&[1.0, 2.0], &options(0)),
            Err(ReduceError::ZeroThreads)
        ));
    }
}
