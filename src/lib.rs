// SPDX-License-Identifier: MIT

//! A laboratory for comparing thread coordination strategies on the same
//! parallel sum.
//!
//! Every backend computes a pairwise doubling reduction: in round `i`,
//! elements `2^(i-1)` apart are combined, so `n = 2^k` values need `k`
//! rounds and `n - 1` combines. The backends differ only in how they spawn
//! the combines of a round and how they wait for the round to finish:
//! joining threads, a countdown latch, a phase barrier, a worker pool, or a
//! queue of tasks with handles. A concurrency token bounds how many combines
//! run at once, independently of how many are dispatched.
//!
//! ```no_run
//! let data = parsum::make_random_array(1234, 1024);
//! let expected = parsum::sequential_sum(&data);
//! let actual = parsum::reduce_thread_barrier(&data, 32)?;
//! assert!(parsum::approx_eq(expected, actual));
//! # Ok::<(), parsum::ReduceError>(())
//! ```

pub mod backends;
pub mod combine;
pub mod config;
pub mod error;
pub mod harness;
pub mod random;
pub mod schedule;
pub mod sequential;
pub mod sync;
pub mod working;

pub use backends::{
    reduce_flat_threads, reduce_naive, reduce_pool, reduce_pool_strided,
    reduce_task_split, reduce_thread_barrier, reduce_thread_gate,
    reduce_thread_join, Backend,
};
pub use combine::{combine, Combine, DelayedAdd};
pub use config::ReduceOptions;
pub use error::{ReduceError, Result};
pub use harness::{
    approx_eq, assert_all_backends_agree, check_all_backends, BackendReport,
};
pub use random::make_random_array;
pub use schedule::{Pair, Round, Schedule};
pub use sequential::sequential_sum;
