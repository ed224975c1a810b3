// SPDX-License-Identifier: MIT

//! Rounds dispatched to a fixed-size worker pool, each closed by a countdown
//! latch.
//!
//! The pool lives for one invocation and has `num_threads` workers, so it
//! bounds concurrency on its own; the tokens still apply on top.

use crate::backends::{
    finish_round, prepare, run_unit_recorded, Deadline, Shared,
};
use crate::config::ReduceOptions;
use crate::error::Result;
use crate::schedule::{Layout, Pair};
use crate::sync::latch::{CountdownLatch, LatchGuard};
use crate::sync::pool::{Task, WorkerPool};
use std::sync::Arc;
use tracing::debug;

/// One combine step queued on the pool.
struct CombineTask {
    shared: Arc<Shared>,
    round: u32,
    pair: Pair,
    /// Signals the round's latch once the pool drops the task.
    _done: LatchGuard,
}

impl Task for CombineTask {
    fn execute(&self) {
        run_unit_recorded(&self.shared, self.round, self.pair);
    }
}

/// Trailing layout: the result ends up in the last element.
pub fn reduce(data: &[f64], options: &ReduceOptions) -> Result<f64> {
    reduce_with_layout(data, options, Layout::Trailing)
}

/// Leading layout: round `s` folds `arr[k * 2^s + 2^(s-1)]` into
/// `arr[k * 2^s]` and the result ends up in element 0.
pub fn reduce_strided(data: &[f64], options: &ReduceOptions) -> Result<f64> {
    reduce_with_layout(data, options, Layout::Leading)
}

fn reduce_with_layout(
    data: &[f64],
    options: &ReduceOptions,
    layout: Layout,
) -> Result<f64> {
    let (schedule, shared) = prepare(data, options, layout)?;
    if schedule.round_count() == 0 {
        return Ok(shared.arr.load(schedule.result_index()));
    }

    let shared = Arc::new(shared);
    let pool = WorkerPool::new(options.num_threads)?;
    let deadline = Deadline::start(options.deadline);

    for round in schedule.rounds() {
        let number = round.number();
        debug!(
            round = number,
            stride = round.offset(),
            units = round.unit_count(),
            ?layout,
            "submitting round"
        );

        let latch = Arc::new(CountdownLatch::new(1));
        for pair in round.pairs() {
            pool.submit(Arc::new(CombineTask {
                shared: Arc::clone(&shared),
                round: number,
                pair,
                _done: latch.guard(),
            }));
        }
        latch.signal();

        if let Err(error) = deadline.wait(&latch, number) {
            // Workers may be stuck inside a combine; do not join them.
            pool.detach();
            return Err(error);
        }
        finish_round(&shared, None)?;
    }

    Ok(shared.arr.load(schedule.result_index()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn options(threads: usize) -> ReduceOptions {
        ReduceOptions::with_threads(threads).delay(Duration::ZERO)
    }

    #[test]
    fn test_both_layouts_sum_eight() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(reduce(&data, &options(2)).unwrap(), 36.0);
        assert_eq!(reduce_strided(&data, &options(2)).unwrap(), 36.0);
    }

    #[test]
    fn test_more_threads_than_units() {
        let data = [0.5; 4];
        assert_eq!(reduce(&data, &options(16)).unwrap(), 2.0);
        assert_eq!(reduce_strided(&data, &options(16)).unwrap(), 2.0);
    }
}
