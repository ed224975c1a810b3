// SPDX-License-Identifier: MIT

//! A fresh scoped thread per pair, joined before the next round starts.
//!
//! The scope is the round's task group: it cannot end before every unit has
//! finished, and the unit results are collected by joining their handles.
//! Joins cannot time out, so this backend ignores `deadline`.

use crate::backends::{prepare, run_unit, Shared};
use crate::config::ReduceOptions;
use crate::error::{panic_message, ReduceError, Result};
use crate::schedule::{Layout, Round};
use std::thread;
use tracing::debug;

pub fn reduce(data: &[f64], options: &ReduceOptions) -> Result<f64> {
    let (schedule, shared) = prepare(data, options, Layout::Trailing)?;
    for round in schedule.rounds() {
        debug!(
            round = round.number(),
            stride = round.offset(),
            units = round.unit_count(),
            "dispatching round"
        );
        run_round(&shared, round)?;
    }
    Ok(shared.arr.load(schedule.result_index()))
}

fn run_round(shared: &Shared, round: Round) -> Result<()> {
    let number = round.number();
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(round.unit_count());
        let mut spawn_error = None;

        for pair in round.pairs() {
            let spawned = thread::Builder::new()
                .spawn_scoped(scope, move || run_unit(shared, number, pair));
            match spawned {
                Ok(handle) => handles.push((pair, handle)),
                Err(source) => {
                    spawn_error = Some(source);
                    break;
                }
            }
        }

        // Join everything that started before reporting anything.
        let mut first_failure = None;
        for (pair, handle) in handles {
            let outcome = handle.join().unwrap_or_else(|payload| {
                Err(ReduceError::WorkerPanicked {
                    round: number,
                    index: pair.target,
                    message: panic_message(payload.as_ref()),
                })
            });
            if let Err(error) = outcome {
                first_failure.get_or_insert(error);
            }
        }

        if let Some(source) = spawn_error {
            return Err(ReduceError::Spawn { source });
        }
        match first_failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    })
}
