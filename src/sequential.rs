// SPDX-License-Identifier: MIT

use crate::combine::{Combine, DelayedAdd};
use crate::error::Result;
use crate::schedule::Schedule;

/// Left fold over `data` on the calling thread, using the default delayed
/// addition. This is the correctness oracle for every backend.
pub fn sequential_sum(data: &[f64]) -> f64 {
    sequential_sum_with(data, &DelayedAdd::default())
}

/// Left fold over `data` with a caller-supplied combine.
///
/// The fold starts from the first element, so `n` elements cost `n - 1`
/// combines. An empty array sums to `0.0`.
pub fn sequential_sum_with(data: &[f64], combine: &dyn Combine) -> f64 {
    match data.split_first() {
        Some((&first, rest)) => rest
            .iter()
            .fold(first, |sum, &value| combine.combine(sum, value)),
        None => 0.0,
    }
}

/// Runs the doubling schedule on a single thread. Shows what every parallel
/// backend computes, without any concurrency.
pub fn reduce_naive(data: &[f64]) -> Result<f64> {
    reduce_naive_with(data, &DelayedAdd::default())
}

pub fn reduce_naive_with(data: &[f64], combine: &dyn Combine) -> Result<f64> {
    let schedule = Schedule::new(data.len())?;
    let mut arr = data.to_vec();
    for round in schedule.rounds() {
        for pair in round.pairs() {
            arr[pair.target] =
                combine.combine(arr[pair.target], arr[pair.source]);
        }
    }
    Ok(arr[schedule.result_index()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReduceError;
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};

    struct CountingAdd(AtomicUsize);

    impl Combine for CountingAdd {
        fn combine(&self, a: f64, b: f64) -> f64 {
            self.0.fetch_add(1, SeqCst);
            a + b
        }
    }

    #[test]
    fn test_sequential_sum_of_eight() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(sequential_sum(&data), 36.0);
        assert_eq!(reduce_naive(&data).unwrap(), 36.0);
    }

    #[test]
    fn test_combine_counts() {
        let counter = CountingAdd(AtomicUsize::new(0));
        let data: Vec<f64> = (0..16).map(f64::from).collect();
        assert_eq!(sequential_sum_with(&data, &counter), 120.0);
        assert_eq!(counter.0.swap(0, SeqCst), 15);
        assert_eq!(reduce_naive_with(&data, &counter).unwrap(), 120.0);
        assert_eq!(counter.0.load(SeqCst), 15);
    }

    #[test]
    fn test_single_element_needs_no_combine() {
        let counter = CountingAdd(AtomicUsize::new(0));
        assert_eq!(sequential_sum_with(&[4.5], &counter), 4.5);
        assert_eq!(reduce_naive_with(&[4.5], &counter).unwrap(), 4.5);
        assert_eq!(counter.0.load(SeqCst), 0);
    }

    #[test]
    fn test_empty_and_odd_lengths() {
        assert_eq!(sequential_sum(&[]), 0.0);
        assert!(matches!(reduce_naive(&[]), Err(ReduceError::EmptyInput)));
        assert!(matches!(
            reduce_naive(&[1.0, 2.0, 3.0]),
            Err(ReduceError::NotPowerOfTwo { len: 3 })
        ));
    }
}
