// SPDX-License-Identifier: MIT

//! The doubling reduction schedule shared by every tree-shaped backend.
//!
//! Round `i` (1-indexed) combines elements `2^(i-1)` apart. With the default
//! trailing layout, index `j` absorbs index `j - 2^(i-1)` whenever
//! `(j + 1) % 2^i == 0`, so after the last round the final element holds the
//! sum of the whole array. The leading layout mirrors this towards index 0.

use crate::error::{ReduceError, Result};

/// Checks that `len` is a valid input length for a doubling reduction.
pub fn validate_doubling_len(len: usize) -> Result<()> {
    if len == 0 {
        return Err(ReduceError::EmptyInput);
    }
    if !len.is_power_of_two() {
        return Err(ReduceError::NotPowerOfTwo { len });
    }
    Ok(())
}

/// Where partial sums accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Partial sums move towards the end; the result is the last element.
    Trailing,
    /// Partial sums move towards the front; the result is element 0.
    Leading,
}

/// One combine step: `arr[target] = combine(arr[target], arr[source])`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair {
    pub target: usize,
    pub source: usize,
}

/// A single synchronization phase of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Round {
    number: u32,
    len: usize,
    layout: Layout,
}

impl Round {
    /// 1-indexed position of this round.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Number of original elements summed into each target after the round.
    pub fn width(&self) -> usize {
        1 << self.number
    }

    /// Distance between the two indices of every pair.
    pub fn offset(&self) -> usize {
        self.width() / 2
    }

    /// Number of pairs combined in this round.
    pub fn unit_count(&self) -> usize {
        self.len / self.width()
    }

    /// The disjoint pairs combined in this round.
    pub fn pairs(&self) -> impl Iterator<Item = Pair> {
        let width = self.width();
        let offset = self.offset();
        let layout = self.layout;
        (0..self.unit_count()).map(move |k| match layout {
            Layout::Trailing => {
                let target = (k + 1) * width - 1;
                Pair {
                    target,
                    source: target - offset,
                }
            }
            Layout::Leading => {
                let target = k * width;
                Pair {
                    target,
                    source: target + offset,
                }
            }
        })
    }
}

/// The full sequence of rounds for an array of a given length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    len: usize,
    layout: Layout,
}

impl Schedule {
    /// Creates the trailing schedule for `len` elements.
    pub fn new(len: usize) -> Result<Self> {
        Self::with_layout(len, Layout::Trailing)
    }

    /// Creates the leading schedule for `len` elements.
    pub fn leading(len: usize) -> Result<Self> {
        Self::with_layout(len, Layout::Leading)
    }

    fn with_layout(len: usize, layout: Layout) -> Result<Self> {
        validate_doubling_len(len)?;
        Ok(Schedule { len, layout })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`: construction rejects an empty input.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index holding the final result once every round has run.
    pub fn result_index(&self) -> usize {
        match self.layout {
            Layout::Trailing => self.len - 1,
            Layout::Leading => 0,
        }
    }

    /// `log2(len)`; zero for a single element.
    pub fn round_count(&self) -> u32 {
        self.len.trailing_zeros()
    }

    pub fn rounds(&self) -> impl Iterator<Item = Round> {
        let len = self.len;
        let layout = self.layout;
        (1..=self.round_count()).map(move |number| Round {
            number,
            len,
            layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs_of(round: Round) -> Vec<(usize, usize)> {
        round.pairs().map(|p| (p.target, p.source)).collect()
    }

    #[test]
    fn test_rejects_invalid_lengths() {
        assert!(matches!(
            Schedule::new(0),
            Err(ReduceError::EmptyInput)
        ));
        assert!(matches!(
            Schedule::new(6),
            Err(ReduceError::NotPowerOfTwo { len: 6 })
        ));
        assert!(Schedule::new(1).is_ok());
        assert!(Schedule::new(1024).is_ok());
    }

    #[test]
    fn test_valid_schedule_is_never_empty() {
        for len in [1, 2, 64] {
            let schedule = Schedule::leading(len).unwrap();
            assert_eq!(schedule.len(), len);
            assert!(!schedule.is_empty());
        }
    }

    #[test]
    fn test_single_element_has_no_rounds() {
        let schedule = Schedule::new(1).unwrap();
        assert_eq!(schedule.round_count(), 0);
        assert_eq!(schedule.rounds().count(), 0);
        assert_eq!(schedule.result_index(), 0);
    }

    #[test]
    fn test_trailing_pairs_for_eight() {
        let schedule = Schedule::new(8).unwrap();
        let rounds: Vec<Round> = schedule.rounds().collect();
        assert_eq!(rounds.len(), 3);
        assert_eq!(pairs_of(rounds[0]), vec![(1, 0), (3, 2), (5, 4), (7, 6)]);
        assert_eq!(pairs_of(rounds[1]), vec![(3, 1), (7, 5)]);
        assert_eq!(pairs_of(rounds[2]), vec![(7, 3)]);
        assert_eq!(schedule.result_index(), 7);
    }

    #[test]
    fn test_leading_pairs_for_eight() {
        let schedule = Schedule::leading(8).unwrap();
        let rounds: Vec<Round> = schedule.rounds().collect();
        assert_eq!(pairs_of(rounds[0]), vec![(0, 1), (2, 3), (4, 5), (6, 7)]);
        assert_eq!(pairs_of(rounds[1]), vec![(0, 2), (4, 6)]);
        assert_eq!(pairs_of(rounds[2]), vec![(0, 4)]);
        assert_eq!(schedule.result_index(), 0);
    }

    #[test]
    fn test_trailing_pairs_match_modulo_rule() {
        let len = 64;
        for round in Schedule::new(len).unwrap().rounds() {
            let expected: Vec<usize> =
                (0..len).filter(|j| (j + 1) % round.width() == 0).collect();
            let targets: Vec<usize> = round.pairs().map(|p| p.target).collect();
            assert_eq!(targets, expected);
            assert_eq!(round.unit_count(), expected.len());
        }
    }

    #[test]
    fn test_partial_sums_after_each_round() {
        // Each element is its own index, so range sums are easy to check.
        let len = 32;
        let mut arr: Vec<u64> = (0..len as u64).collect();
        for round in Schedule::new(len).unwrap().rounds() {
            for pair in round.pairs() {
                arr[pair.target] += arr[pair.source];
            }
            for j in 0..len {
                if (j + 1) % round.width() == 0 {
                    let first = (j + 1 - round.width()) as u64;
                    let expected: u64 = (first..=j as u64).sum();
                    assert_eq!(arr[j], expected);
                }
            }
        }
        assert_eq!(arr[len - 1], (0..len as u64).sum::<u64>());
    }
}
