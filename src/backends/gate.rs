// SPDX-License-Identifier: MIT

//! A fresh thread per pair; each round waits on a countdown latch.

use crate::backends::{finish_round, prepare, run_unit_recorded, Deadline};
use crate::config::ReduceOptions;
use crate::error::Result;
use crate::schedule::Layout;
use crate::sync::latch::CountdownLatch;
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

        // The dispatcher holds one count until every unit is handed out.
        let latch = Arc::new(CountdownLatch::new(1));
        let mut spawn_error = None;
        for pair in round.pairs() {
            let done = latch.guard();
            let shared = Arc::clone(&shared);
            let spawned = thread::Builder::new().spawn(move || {
                let _done = done;
                run_unit_recorded(&shared, number, pair);
            });
            if let Err(source) = spawned {
                spawn_error = Some(source);
                break;
            }
        }
        latch.signal();

        deadline.wait(&latch, number)?;
        finish_round(&shared, spawn_error)?;
    }

    Ok(shared.arr.load(schedule.result_index()))
}
