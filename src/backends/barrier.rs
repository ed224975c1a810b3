// SPDX-License-Identifier: MIT

//! A fresh thread per pair; each round ends at a phase barrier.
//!
//! The barrier is rebuilt every round because the number of participants
//! halves from one round to the next. The dispatcher is a participant too.

use crate::backends::{finish_round, prepare, run_unit_recorded, Deadline};
use crate::config::ReduceOptions;
use crate::error::Result;
use crate::schedule::Layout;
use crate::sync::barrier::PhaseBarrier;
use std::sync::Arc;
use std::thread;
use tracing::debug;

pub fn reduce(data: &[f64], options: &ReduceOptions) -> Result<f64> {
    let (schedule, shared) = prepare(data, options, Layout::Trailing)?;
    let shared = Arc::new(shared);
    let deadline = Deadline::start(options.deadline);

    for round in schedule.rounds() {
        let number = round.number();
        debug!(
            round = number,
            stride = round.offset(),
            units = round.unit_count(),
            "dispatching round"
        );

        let barrier = Arc::new(PhaseBarrier::new(1));
        let mut spawn_error = None;
        for pair in round.pairs() {
            barrier.add_participant();
            let shared = Arc::clone(&shared);
            let worker_barrier = Arc::clone(&barrier);
            let spawned = thread::Builder::new().spawn(move || {
                run_unit_recorded(&shared, number, pair);
                worker_barrier.arrive_and_wait();
            });
            if let Err(source) = spawned {
                // This party will never arrive.
                barrier.remove_participant();
                spawn_error = Some(source);
                break;
            }
        }

        match deadline.at() {
            Some(at) => {
                if !barrier.arrive_and_wait_until(at) {
                    return Err(deadline.exceeded(number));
                }
            }
            None => barrier.arrive_and_wait(),
        }
        finish_round(&shared, spawn_error)?;
    }

    Ok(shared.arr.load(schedule.result_index()))
}
