// SPDX-License-Identifier: MIT

//! Concurrency backends.
//!
//! Every doubling backend copies the input, walks the same [`Schedule`] and
//! differs only in how a round's units are dispatched and how the dispatcher
//! learns that the round is over:
//!
//! | Backend         | Dispatch                  | Completion              |
//! |-----------------|---------------------------|-------------------------|
//! | `ThreadJoin`    | scoped thread per pair    | join every handle       |
//! | `ThreadGate`    | thread per pair           | countdown latch         |
//! | `ThreadBarrier` | thread per pair           | phase barrier           |
//! | `Pool`          | worker pool task per pair | countdown latch         |
//! | `PoolStrided`   | worker pool, leading      | countdown latch         |
//! | `TaskSplit`     | recursive split into queue| wait on task handles    |
//!
//! `FlatThreads` is the odd one out: one thread per element folding into a
//! single locked accumulator, with no rounds at all.

pub mod barrier;
pub mod flat;
pub mod gate;
pub mod join;
pub mod pool;
pub mod task_split;

use crate::combine::Combine;
use crate::config::ReduceOptions;
use crate::error::{panic_message, ReduceError, Result};
use crate::schedule::{Layout, Pair, Schedule};
use crate::sequential;
use crate::sync::latch::CountdownLatch;
use crate::sync::lock;
use crate::sync::semaphore::Semaphore;
use crate::working::WorkingCopy;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info_span, trace, warn};

/// The reduction strategies this crate can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Doubling schedule on the calling thread.
    Naive,
    /// One thread per element, shared accumulator under a lock.
    FlatThreads,
    /// Thread per pair, joined at the end of each round.
    ThreadJoin,
    /// Thread per pair, countdown latch per round.
    ThreadGate,
    /// Thread per pair, phase barrier per round.
    ThreadBarrier,
    /// Worker pool, countdown latch per round.
    Pool,
    /// Worker pool over the leading layout, countdown latch per round.
    PoolStrided,
    /// Recursive split into a bounded task queue, wait on task handles.
    TaskSplit,
}

impl Backend {
    pub const ALL: [Backend; 8] = [
        Backend::Naive,
        Backend::FlatThreads,
        Backend::ThreadJoin,
        Backend::ThreadGate,
        Backend::ThreadBarrier,
        Backend::Pool,
        Backend::PoolStrided,
        Backend::TaskSplit,
    ];

    /// Short label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Backend::Naive => "pseudo-parallel",
            Backend::FlatThreads => "basic-threads-sum",
            Backend::ThreadJoin => "basic-threads-sem",
            Backend::ThreadGate => "basic-threads-cde",
            Backend::ThreadBarrier => "basic-threads-bar",
            Backend::Pool => "threadpool-1",
            Backend::PoolStrided => "threadpool-2",
            Backend::TaskSplit => "task-factory",
        }
    }

    /// Whether the backend walks the doubling schedule and therefore needs
    /// a power-of-two length.
    pub fn is_doubling(&self) -> bool {
        !matches!(self, Backend::FlatThreads)
    }

    /// Reduces `data` with this backend.
    pub fn run(&self, data: &[f64], options: &ReduceOptions) -> Result<f64> {
        let _span =
            info_span!("reduce", backend = self.label(), len = data.len())
                .entered();
        match self {
            Backend::Naive => {
                let combine = options.combine_op();
                sequential::reduce_naive_with(data, combine.as_ref())
            }
            Backend::FlatThreads => flat::reduce(data, options),
            Backend::ThreadJoin => join::reduce(data, options),
            Backend::ThreadGate => gate::reduce(data, options),
            Backend::ThreadBarrier => barrier::reduce(data, options),
            Backend::Pool => pool::reduce(data, options),
            Backend::PoolStrided => pool::reduce_strided(data, options),
            Backend::TaskSplit => task_split::reduce(data, options),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Doubling schedule on the calling thread with the default combine.
pub fn reduce_naive(data: &[f64]) -> Result<f64> {
    sequential::reduce_naive(data)
}

pub fn reduce_flat_threads(data: &[f64], num_threads: usize) -> Result<f64> {
    Backend::FlatThreads.run(data, &ReduceOptions::with_threads(num_threads))
}

pub fn reduce_thread_join(data: &[f64], num_threads: usize) -> Result<f64> {
    Backend::ThreadJoin.run(data, &ReduceOptions::with_threads(num_threads))
}

pub fn reduce_thread_gate(data: &[f64], num_threads: usize) -> Result<f64> {
    Backend::ThreadGate.run(data, &ReduceOptions::with_threads(num_threads))
}

pub fn reduce_thread_barrier(data: &[f64], num_threads: usize) -> Result<f64> {
    Backend::ThreadBarrier.run(data, &ReduceOptions::with_threads(num_threads))
}

pub fn reduce_pool(data: &[f64], num_threads: usize) -> Result<f64> {
    Backend::Pool.run(data, &ReduceOptions::with_threads(num_threads))
}

pub fn reduce_pool_strided(data: &[f64], num_threads: usize) -> Result<f64> {
    Backend::PoolStrided.run(data, &ReduceOptions::with_threads(num_threads))
}

pub fn reduce_task_split(data: &[f64], num_threads: usize) -> Result<f64> {
    Backend::TaskSplit.run(data, &ReduceOptions::with_threads(num_threads))
}

/// Keeps the first failure reported by any unit of an invocation.
#[derive(Default)]
pub(crate) struct FirstFailure {
    slot: Mutex<Option<ReduceError>>,
}

impl FirstFailure {
    pub(crate) fn record(&self, error: ReduceError) {
        let mut slot = lock(&self.slot);
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        match lock(&self.slot).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// State every unit of a doubling invocation works against.
pub(crate) struct Shared {
    pub(crate) arr: WorkingCopy,
    pub(crate) tokens: Semaphore,
    pub(crate) combine: Arc<dyn Combine>,
    pub(crate) failure: FirstFailure,
}

/// Validates the inputs of a doubling backend and builds its private state.
pub(crate) fn prepare(
    data: &[f64],
    options: &ReduceOptions,
    layout: Layout,
) -> Result<(Schedule, Shared)> {
    if options.num_threads == 0 {
        return Err(ReduceError::ZeroThreads);
    }
    let schedule = match layout {
        Layout::Trailing => Schedule::new(data.len())?,
        Layout::Leading => Schedule::leading(data.len())?,
    };
    let shared = Shared {
        arr: WorkingCopy::from_slice(data),
        tokens: Semaphore::new(options.num_threads),
        combine: options.combine_op(),
        failure: FirstFailure::default(),
    };
    Ok((schedule, shared))
}

/// Performs one combine step under a concurrency token.
///
/// A panicking combine leaves `arr[pair.target]` untouched and comes back as
/// [`ReduceError::WorkerPanicked`].
pub(crate) fn run_unit(shared: &Shared, round: u32, pair: Pair) -> Result<()> {
    let _permit = shared.tokens.acquire();
    trace!(round, target = pair.target, source = pair.source, "combine");
    let a = shared.arr.load(pair.target);
    let b = shared.arr.load(pair.source);
    let outcome =
        panic::catch_unwind(AssertUnwindSafe(|| shared.combine.combine(a, b)));
    match outcome {
        Ok(value) => {
            shared.arr.store(pair.target, value);
            Ok(())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(
                round,
                index = pair.target,
                error = %message,
                "combine panicked"
            );
            Err(ReduceError::WorkerPanicked {
                round,
                index: pair.target,
                message,
            })
        }
    }
}

/// Runs a unit and parks any failure in the shared slot.
pub(crate) fn run_unit_recorded(shared: &Shared, round: u32, pair: Pair) {
    if let Err(error) = run_unit(shared, round, pair) {
        shared.failure.record(error);
    }
}

/// Closes a round: a failed spawn wins over worker failures, since it means
/// the round was never fully dispatched.
pub(crate) fn finish_round(
    shared: &Shared,
    spawn_error: Option<io::Error>,
) -> Result<()> {
    if let Some(source) = spawn_error {
        return Err(ReduceError::Spawn { source });
    }
    shared.failure.check()
}

/// Time budget of one invocation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    limit: Option<Duration>,
    at: Option<Instant>,
}

impl Deadline {
    pub(crate) fn start(limit: Option<Duration>) -> Self {
        Deadline {
            limit,
            at: limit.map(|limit| Instant::now() + limit),
        }
    }

    pub(crate) fn at(&self) -> Option<Instant> {
        self.at
    }

    pub(crate) fn exceeded(&self, round: u32) -> ReduceError {
        let deadline = self.limit.unwrap_or_default();
        warn!(round, ?deadline, "round missed its deadline");
        ReduceError::DeadlineExceeded { round, deadline }
    }

    /// Waits for `latch` to open, failing once the budget runs out.
    pub(crate) fn wait(&self, latch: &CountdownLatch, round: u32) -> Result<()> {
        match self.at {
            None => {
                latch.wait();
                Ok(())
            }
            Some(at) if latch.wait_until(at) => Ok(()),
            Some(_) => Err(self.exceeded(round)),
        }
    }
}
