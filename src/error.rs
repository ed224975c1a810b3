// SPDX-License-Identifier: MIT

//! Error types for reduction backends.

use std::io;
use std::time::Duration;

/// Result type for reduction operations.
pub type Result<T> = std::result::Result<T, ReduceError>;

/// Errors that can occur while running a reduction.
#[derive(Debug, thiserror::Error)]
pub enum ReduceError {
    /// The input array holds no elements.
    #[error("input array is empty")]
    EmptyInput,

    /// The doubling schedule needs a power-of-two length.
    #[error("input length {len} is not a power of two")]
    NotPowerOfTwo { len: usize },

    /// A concurrency limit of zero would block every unit forever.
    #[error("number of threads must be at least 1")]
    ZeroThreads,

    /// A combine panicked inside a worker.
    #[error("worker panicked in round {round} at index {index}: {message}")]
    WorkerPanicked {
        round: u32,
        index: usize,
        message: String,
    },

    /// The operating system refused to create a thread.
    #[error("failed to spawn worker thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },

    /// A round did not complete before the configured deadline.
    #[error("round {round} did not complete within {deadline:?}")]
    DeadlineExceeded { round: u32, deadline: Duration },

    /// A backend disagreed with the sequential baseline.
    #[error("backend {backend} returned {actual}, expected {expected}")]
    Disagreement {
        backend: &'static str,
        expected: f64,
        actual: f64,
    },
}

impl From<io::Error> for ReduceError {
    fn from(source: io::Error) -> Self {
        ReduceError::Spawn { source }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
