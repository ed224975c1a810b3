// SPDX-License-Identifier: MIT

use parsum::sequential::sequential_sum_with;
use parsum::{approx_eq, make_random_array, Backend, ReduceOptions};
use std::time::{Duration, Instant};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Iterations per measurement; the median is reported.
const ITERATIONS: usize = 5;

/// Benchmarks one backend on a random array.
///
/// # Arguments
/// * `backend` - Backend under test
/// * `thread_count` - Concurrency limit handed to the backend
/// * `array_size` - Number of elements to sum
///
/// # Returns
/// Median duration of the reduction in seconds
fn benchmark_backend(
    backend: Backend,
    thread_count: usize,
    array_size: usize,
) -> f64 {
    let options = ReduceOptions::with_threads(thread_count);
    let input_array = make_random_array(1234, array_size);
    let expected =
        sequential_sum_with(&input_array, &*options.combine_op());

    let mut times: Vec<Duration> = Vec::with_capacity(ITERATIONS);
    for _ in 0..ITERATIONS {
        let start_time = Instant::now();
        let result = match backend.run(&input_array, &options) {
            Ok(result) => result,
            Err(error) => panic!("{backend} failed: {error}"),
        };
        times.push(start_time.elapsed());

        // Verify result before trusting the timing.
        assert!(approx_eq(expected, result), "{backend} disagrees");
    }

    times.sort();
    times[times.len() / 2].as_secs_f64()
}

fn main() {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("off")),
                ),
        )
        .init();

    println!("Running benchmarks...\n");

    // Benchmark 1: every backend with the default size and thread count.
    println!("Benchmark 1: All backends (1024 elements, 32 threads)");
    for backend in Backend::ALL {
        let time = benchmark_backend(backend, 32, 1024);
        println!("{:<18} {:.6} seconds", backend.label(), time);
    }
    println!();

    // Benchmark 2: concurrency limit scaling for the gated backends.
    println!("Benchmark 2: Scaling thread count (1024 elements)");
    for backend in [Backend::ThreadGate, Backend::ThreadBarrier, Backend::Pool]
    {
        for threads in [1, 4, 16, 32] {
            let time = benchmark_backend(backend, threads, 1024);
            println!(
                "{:<18} {:2} threads: {:.6} seconds",
                backend.label(),
                threads,
                time
            );
        }
    }
    println!();

    // Benchmark 3: array size scaling with a fixed limit.
    println!("Benchmark 3: Scaling array size (32 threads)");
    for size in [256, 1024, 4096] {
        for backend in [Backend::ThreadJoin, Backend::Pool, Backend::TaskSplit]
        {
            let time = benchmark_backend(backend, 32, size);
            println!(
                "{:<18} {:5} elements: {:.6} seconds",
                backend.label(),
                size,
                time
            );
        }
    }
}
