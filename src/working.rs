// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicU64, Ordering::SeqCst};

/// Backend-private copy of the input array.
///
/// Elements are stored as `f64` bit patterns in atomics so that workers of a
/// round can write their disjoint targets through a shared reference. Rounds
/// are separated by a completion signal, which orders every write of round
/// `i` before every read of round `i + 1`.
#[derive(Debug)]
pub struct WorkingCopy {
    cells: Box<[AtomicU64]>,
}

impl WorkingCopy {
    /// Copies `data` into a fresh working array.
    pub fn from_slice(data: &[f64]) -> Self {
        WorkingCopy {
            cells: data.iter().map(|v| AtomicU64::new(v.to_bits())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn load(&self, index: usize) -> f64 {
        f64::from_bits(self.cells[index].load(SeqCst))
    }

    pub fn store(&self, index: usize, value: f64) {
        self.cells[index].store(value.to_bits(), SeqCst);
    }

    /// Snapshot of the current contents.
    pub fn to_vec(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.load(i)).collect()
    }
}
