// SPDX-License-Identifier: MIT

use crate::sync::lock;
use std::sync::{Condvar, Mutex};
use std::time::Instant;

/// Arrival bookkeeping for one barrier.
struct BarrierState {
    /// Parties that must arrive before the barrier trips.
    participants: usize,
    /// Parties that have arrived in the current phase.
    arrived: usize,
    /// Number of times the barrier has tripped.
    phase: u64,
}

/// Barrier whose participant count can change between phases.
///
/// Every participant calls [`arrive_and_wait`](Self::arrive_and_wait); the
/// last one to arrive trips the barrier and releases the others.
pub struct PhaseBarrier {
    state: Mutex<BarrierState>,
    /// Notified when the barrier trips.
    tripped: Condvar,
}

impl PhaseBarrier {
    pub fn new(participants: usize) -> Self {
        PhaseBarrier {
            state: Mutex::new(BarrierState {
                participants,
                arrived: 0,
                phase: 0,
            }),
            tripped: Condvar::new(),
        }
    }

    #[cfg(test)]
    fn participants(&self) -> usize {
        lock(&self.state).participants
    }

    /// Number of completed phases.
    #[cfg(test)]
    fn phase(&self) -> u64 {
        lock(&self.state).phase
    }

    pub fn add_participant(&self) {
        lock(&self.state).participants += 1;
    }

    /// Withdraws a participant that will never arrive. Trips the barrier if
    /// everyone else is already waiting.
    pub fn remove_participant(&self) {
        let mut state = lock(&self.state);
        debug_assert!(state.participants > 0);
        state.participants = state.participants.saturating_sub(1);
        if state.arrived > 0 && state.arrived >= state.participants {
            Self::trip(&mut state, &self.tripped);
        }
    }

    /// Registers arrival and blocks until every participant has arrived.
    pub fn arrive_and_wait(&self) {
        let mut state = lock(&self.state);
        let phase = state.phase;

        // Increment arrival count to signal that this party has reached the
        // barrier.
        state.arrived += 1;

        // Release everyone if this is the last party to arrive.
        if state.arrived >= state.participants {
            Self::trip(&mut state, &self.tripped);
            return;
        }

        // Otherwise, wait for the remaining parties.
        while state.phase == phase {
            state = self
                .tripped
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Like [`arrive_and_wait`](Self::arrive_and_wait) but gives up waiting
    /// at `deadline`. The arrival stays counted either way, so the remaining
    /// parties still trip the barrier. Returns whether the barrier tripped.
    pub fn arrive_and_wait_until(&self, deadline: Instant) -> bool {
        let mut state = lock(&self.state);
        let phase = state.phase;
        state.arrived += 1;

        if state.arrived >= state.participants {
            Self::trip(&mut state, &self.tripped);
            return true;
        }

        while state.phase == phase {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match self.tripped.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    fn trip(state: &mut BarrierState, tripped: &Condvar) {
        state.arrived = 0;
        state.phase += 1;
        tripped.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_single_participant_never_blocks() {
        let barrier = PhaseBarrier::new(1);
        barrier.arrive_and_wait();
        barrier.arrive_and_wait();
        assert_eq!(barrier.phase(), 2);
    }

    #[test]
    fn test_all_work_visible_after_trip() {
        let barrier = Arc::new(PhaseBarrier::new(1));
        let finished = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            barrier.add_participant();
            let barrier = Arc::clone(&barrier);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(2));
                finished.fetch_add(1, SeqCst);
                barrier.arrive_and_wait();
            });
        }
        assert_eq!(barrier.participants(), 9);

        barrier.arrive_and_wait();
        assert_eq!(finished.load(SeqCst), 8);
        assert_eq!(barrier.phase(), 1);
    }

    #[test]
    fn test_removing_last_missing_participant_trips() {
        let barrier = Arc::new(PhaseBarrier::new(2));
        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.arrive_and_wait())
        };

        // Wait for the other party to be parked on the barrier.
        while lock(&barrier.state).arrived == 0 {
            thread::yield_now();
        }
        barrier.remove_participant();
        waiter.join().unwrap();
        assert_eq!(barrier.phase(), 1);
    }

    #[test]
    fn test_withdrawn_party_does_not_block_dispatcher() {
        // Dispatcher plus two workers, the second of which never starts.
        let barrier = Arc::new(PhaseBarrier::new(1));
        barrier.add_participant();
        let worker = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.arrive_and_wait())
        };
        barrier.add_participant();
        barrier.remove_participant();
        assert_eq!(barrier.participants(), 2);

        let deadline = Instant::now() + Duration::from_secs(5);
        assert!(barrier.arrive_and_wait_until(deadline));
        worker.join().unwrap();
        assert_eq!(barrier.phase(), 1);
    }

    #[test]
    fn test_timed_arrival_gives_up() {
        let barrier = PhaseBarrier::new(2);
        let deadline = Instant::now() + Duration::from_millis(10);
        assert!(!barrier.arrive_and_wait_until(deadline));
        assert_eq!(barrier.phase(), 0);

        // The late party still completes the phase.
        barrier.arrive_and_wait();
        assert_eq!(barrier.phase(), 1);
    }
}
