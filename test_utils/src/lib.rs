// SPDX-License-Identifier: MIT

pub mod probes;

/// The small literal input most scenarios start from.
pub const ONE_TO_EIGHT: [f64; 8] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

/// `[1.0, 2.0, ..., len as f64]`.
pub fn ascending(len: usize) -> Vec<f64> {
    (1..=len).map(|i| i as f64).collect()
}
