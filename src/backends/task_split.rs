// SPDX-License-Identifier: MIT

//! Each round's pairs are split in halves recursively and every leaf is
//! submitted as its own task to a bounded queue. The round ends once every
//! task handle has been awaited.

use crate::backends::{prepare, run_unit, Deadline, Shared};
use crate::config::ReduceOptions;
use crate::error::{ReduceError, Result};
use crate::schedule::{Layout, Pair};
use crate::sync::task_queue::{wait_all, TaskError, TaskHandle, TaskQueue};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub fn reduce(data: &[f64], options: &ReduceOptions) -> Result<f64> {
    let (schedule, shared) = prepare(data, options, Layout::Trailing)?;
    if schedule.round_count() == 0 {
        return Ok(shared.arr.load(schedule.result_index()));
    }

    let shared = Arc::new(shared);
    let queue = TaskQueue::new(options.num_threads, options.num_threads)?;
    let deadline = Deadline::start(options.deadline);

    for round in schedule.rounds() {
        let number = round.number();
        debug!(
            round = number,
            stride = round.offset(),
            units = round.unit_count(),
            "splitting round"
        );

        let pairs: Vec<Pair> = round.pairs().collect();
        let mut handles = Vec::with_capacity(pairs.len());
        let at = deadline.at();
        if split(&queue, &shared, number, &pairs, at, &mut handles).is_err() {
            // Dispatch itself ran out of time on a full queue.
            queue.detach();
            return Err(deadline.exceeded(number));
        }

        let mut first_failure = None;
        for (pair, outcome) in pairs.iter().zip(wait_all(handles, at)) {
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error,
                Err(TaskError::TimedOut) => {
                    queue.detach();
                    return Err(deadline.exceeded(number));
                }
                Err(other) => ReduceError::WorkerPanicked {
                    round: number,
                    index: pair.target,
                    message: other.to_string(),
                },
            };
            first_failure.get_or_insert(error);
        }
        if let Some(error) = first_failure {
            return Err(error);
        }
    }

    Ok(shared.arr.load(schedule.result_index()))
}

/// Submits `pairs` left to right, halving the slice until a single pair is
/// left. Handles come out in the same order as `pairs`. Stops at the first
/// submission still blocked on a full queue at `deadline`.
fn split(
    queue: &TaskQueue,
    shared: &Arc<Shared>,
    round: u32,
    pairs: &[Pair],
    deadline: Option<Instant>,
    handles: &mut Vec<TaskHandle<Result<()>>>,
) -> std::result::Result<(), TaskError> {
    match pairs {
        [] => Ok(()),
        [pair] => {
            let shared = Arc::clone(shared);
            let pair = *pair;
            let handle = queue.spawn_until(
                move || run_unit(&shared, round, pair),
                deadline,
            )?;
            handles.push(handle);
            Ok(())
        }
        _ => {
            let (left, right) = pairs.split_at(pairs.len() / 2);
            split(queue, shared, round, left, deadline, handles)?;
            split(queue, shared, round, right, deadline, handles)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_sums_power_of_two_range() {
        let data: Vec<f64> = (0..64).map(f64::from).collect();
        let options = ReduceOptions::with_threads(3).delay(Duration::ZERO);
        assert_eq!(reduce(&data, &options).unwrap(), 2016.0);
    }

    #[test]
    fn test_deadline_is_reported() {
        let options = ReduceOptions::with_threads(1)
            .delay(Duration::from_millis(100))
            .deadline(Duration::from_millis(10));
        assert!(matches!(
            reduce(&[1.0; 8], &options),
            Err(ReduceError::DeadlineExceeded { round: 1, .. })
        ));
    }

    #[test]
    fn test_deadline_holds_while_queue_is_full() {
        let options = ReduceOptions::with_threads(1)
            .delay(Duration::from_millis(500))
            .deadline(Duration::from_millis(20));
        let start = Instant::now();
        let outcome = reduce(&[1.0; 16], &options);
        assert!(start.elapsed() < Duration::from_millis(200));
        assert!(matches!(
            outcome,
            Err(ReduceError::DeadlineExceeded { round: 1, .. })
        ));
    }
}
