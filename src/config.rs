// SPDX-License-Identifier: MIT

use crate::combine::{Combine, DelayedAdd, DEFAULT_DELAY};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding [`ReduceOptions::num_threads`].
pub const THREADS_ENV: &str = "PARSUM_THREADS";
/// Environment variable overriding [`ReduceOptions::delay`], in milliseconds.
pub const DELAY_ENV: &str = "PARSUM_DELAY_MS";
/// Environment variable setting [`ReduceOptions::deadline`], in milliseconds.
pub const DEADLINE_ENV: &str = "PARSUM_DEADLINE_MS";

/// Upper bound for the default concurrency limit.
const MAX_DEFAULT_THREADS: usize = 32;

/// Settings shared by every backend invocation.
#[derive(Clone)]
pub struct ReduceOptions {
    /// Maximum number of combines running at the same instant.
    pub num_threads: usize,
    /// Artificial latency of each combine when no custom operation is set.
    pub delay: Duration,
    /// Time budget for the whole invocation. `None` waits forever.
    pub deadline: Option<Duration>,
    /// Custom combine operation, replacing the delayed addition.
    combine: Option<Arc<dyn Combine>>,
}

impl ReduceOptions {
    /// Default settings with the given concurrency limit.
    pub fn with_threads(num_threads: usize) -> Self {
        ReduceOptions {
            num_threads,
            ..Self::default()
        }
    }

    /// Reads overrides from `PARSUM_THREADS`, `PARSUM_DELAY_MS` and
    /// `PARSUM_DEADLINE_MS`. Unset or malformed variables keep the defaults.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(threads) = env_value::<usize>(THREADS_ENV) {
            options.num_threads = threads;
        }
        if let Some(millis) = env_value::<u64>(DELAY_ENV) {
            options.delay = Duration::from_millis(millis);
        }
        if let Some(millis) = env_value::<u64>(DEADLINE_ENV) {
            options.deadline = Some(Duration::from_millis(millis));
        }
        options
    }

    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Replaces the delayed addition with `combine`.
    pub fn combine(mut self, combine: Arc<dyn Combine>) -> Self {
        self.combine = Some(combine);
        self
    }

    /// The operation backends apply at every combine step.
    pub fn combine_op(&self) -> Arc<dyn Combine> {
        match &self.combine {
            Some(combine) => Arc::clone(combine),
            None => Arc::new(DelayedAdd::new(self.delay)),
        }
    }
}

impl Default for ReduceOptions {
    fn default() -> Self {
        ReduceOptions {
            num_threads: default_threads(),
            delay: DEFAULT_DELAY,
            deadline: None,
            combine: None,
        }
    }
}

impl fmt::Debug for ReduceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReduceOptions")
            .field("num_threads", &self.num_threads)
            .field("delay", &self.delay)
            .field("deadline", &self.deadline)
            .field("custom_combine", &self.combine.is_some())
            .finish()
    }
}

/// Available parallelism, clamped to `1..=32`.
pub fn default_threads() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .clamp(1, MAX_DEFAULT_THREADS)
}

/// Parses the environment variable `name`, warning when it is malformed.
pub fn env_value<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring malformed setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Multiply;

    impl Combine for Multiply {
        fn combine(&self, a: f64, b: f64) -> f64 {
            a * b
        }
    }

    #[test]
    fn test_defaults() {
        let options = ReduceOptions::default();
        assert!((1..=MAX_DEFAULT_THREADS).contains(&options.num_threads));
        assert_eq!(options.delay, Duration::from_millis(1));
        assert_eq!(options.deadline, None);
    }

    #[test]
    fn test_builder_overrides() {
        let options = ReduceOptions::with_threads(3)
            .delay(Duration::ZERO)
            .deadline(Duration::from_secs(2))
            .combine(Arc::new(Multiply));
        assert_eq!(options.num_threads, 3);
        assert_eq!(options.deadline, Some(Duration::from_secs(2)));
        assert_eq!(options.combine_op().combine(3.0, 4.0), 12.0);
    }

    #[test]
    fn test_default_combine_adds() {
        let options = ReduceOptions::default().delay(Duration::ZERO);
        assert_eq!(options.combine_op().combine(3.0, 4.0), 7.0);
    }

    #[test]
    fn test_env_value_parses_and_rejects() {
        env::set_var("PARSUM_TEST_GOOD", " 12 ");
        env::set_var("PARSUM_TEST_BAD", "twelve");
        assert_eq!(env_value::<usize>("PARSUM_TEST_GOOD"), Some(12));
        assert_eq!(env_value::<usize>("PARSUM_TEST_BAD"), None);
        assert_eq!(env_value::<usize>("PARSUM_TEST_UNSET"), None);
    }
}
