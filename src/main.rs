// SPDX-License-Identifier: MIT

use parsum::config::env_value;
use parsum::sequential::sequential_sum_with;
use parsum::{make_random_array, Backend, ReduceOptions};
use std::process::ExitCode;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Number of elements reduced, overridable with `PARSUM_SIZE`.
const DEFAULT_SIZE: usize = 1024;
/// Generator seed, overridable with `PARSUM_SEED`.
const DEFAULT_SEED: u64 = 1234;

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("off")),
                ),
        )
        .init();

    let size = env_value("PARSUM_SIZE").unwrap_or(DEFAULT_SIZE);
    let seed = env_value("PARSUM_SEED").unwrap_or(DEFAULT_SEED);
    let options = ReduceOptions::from_env();
    let numbers = make_random_array(seed, size);

    let combine = options.combine_op();
    let baseline = sequential_sum_with(&numbers, combine.as_ref());
    println!("{:<19}{baseline}", "sequential:");

    let mut failed = false;
    for backend in Backend::ALL {
        let label = format!("{}:", backend.label());
        match backend.run(&numbers, &options) {
            Ok(sum) => println!("{label:<19}{sum}"),
            Err(error) => {
                println!("{label:<19}error: {error}");
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
