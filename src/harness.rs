// SPDX-License-Identifier: MIT

//! Cross-checks every backend against the sequential baseline.

use crate::backends::Backend;
use crate::config::ReduceOptions;
use crate::error::{ReduceError, Result};
use crate::sequential::sequential_sum_with;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Relative tolerance for comparing reduction results.
pub const EPSILON: f64 = 1e-9;

/// `|a - b| <= EPSILON * max(1, |a|)`.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON * a.abs().max(1.0)
}

/// Outcome of one backend run.
#[derive(Debug, Clone, Copy)]
pub struct BackendReport {
    pub backend: Backend,
    pub result: f64,
    pub elapsed: Duration,
}

/// Runs the baseline and then every backend that accepts `data`, failing on
/// the first error or disagreement. Doubling backends are skipped when the
/// length is not a power of two.
pub fn check_all_backends(
    data: &[f64],
    options: &ReduceOptions,
) -> Result<(f64, Vec<BackendReport>)> {
    let combine = options.combine_op();
    let expected = sequential_sum_with(data, combine.as_ref());
    debug!(len = data.len(), expected, "baseline computed");

    let eligible = |backend: &Backend| {
        !backend.is_doubling() || data.len().is_power_of_two()
    };
    let mut reports = Vec::with_capacity(Backend::ALL.len());
    for backend in Backend::ALL.into_iter().filter(eligible) {
        let start = Instant::now();
        let result = backend.run(data, options)?;
        let elapsed = start.elapsed();
        info!(backend = backend.label(), result, ?elapsed, "backend finished");

        if !approx_eq(expected, result) {
            return Err(ReduceError::Disagreement {
                backend: backend.label(),
                expected,
                actual: result,
            });
        }
        reports.push(BackendReport {
            backend,
            result,
            elapsed,
        });
    }
    Ok((expected, reports))
}

/// Panics unless every backend agrees with the sequential baseline on
/// `data`, using the default options.
pub fn assert_all_backends_agree(data: &[f64]) {
    if let Err(error) = check_all_backends(data, &ReduceOptions::default()) {
        panic!("backends disagree on {} elements: {error}", data.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approx_eq_scales_with_magnitude() {
        assert!(approx_eq(1.0, 1.0 + 1e-12));
        assert!(!approx_eq(1.0, 1.0 + 1e-6));
        assert!(approx_eq(1e12, 1e12 + 1e2));
        assert!(!approx_eq(1e12, 1e12 + 1e4));
        assert!(approx_eq(0.0, 1e-10));
    }

    #[test]
    fn test_non_power_of_two_runs_flat_only() {
        let options = ReduceOptions::with_threads(2)
            .delay(std::time::Duration::ZERO);
        let (expected, reports) =
            check_all_backends(&[1.0, 2.0, 3.0], &options).unwrap();
        assert_eq!(expected, 6.0);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].backend, Backend::FlatThreads);
    }
}
