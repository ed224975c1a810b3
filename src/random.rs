// SPDX-License-Identifier: MIT

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generates `size` values uniformly distributed in `[0, 1)`.
///
/// The same seed always yields the same sequence for a given `rand` major
/// version.
pub fn make_random_array(seed: u64, size: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size).map(|_| rng.gen::<f64>()).collect()
}
