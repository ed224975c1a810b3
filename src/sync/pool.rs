// SPDX-License-Identifier: MIT

use crate::error::{panic_message, Result};
use crate::sync::lock;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use tracing::{debug, warn};

/// Trait defining a unit of work run by a pool worker.
pub trait Task {
    fn execute(&self);
}

/// Shared data for the pool, holding the task queue and a shutdown flag.
struct PoolSharedData {
    /// Queue of tasks for worker threads.
    task_queue: VecDeque<Arc<dyn Task + Send + Sync>>,
    /// Flag to signal shutdown to worker threads.
    shutdown_flag: bool,
}

impl PoolSharedData {
    fn new() -> Self {
        PoolSharedData {
            task_queue: VecDeque::with_capacity(128),
            shutdown_flag: false,
        }
    }
}

/// Fixed-size pool of worker threads pulling tasks from a shared queue.
///
/// Dropping the pool signals shutdown and joins every worker. Tasks still
/// queued at that point are dropped without running.
pub struct WorkerPool {
    /// Pool of worker threads.
    worker_threads: Vec<thread::JoinHandle<()>>,
    /// Shared data protected by a mutex.
    shared_data: Arc<Mutex<PoolSharedData>>,
    /// Condition variable to notify workers of new tasks or shutdown.
    task_available: Arc<Condvar>,
}

impl WorkerPool {
    /// Creates a pool with `thread_count` workers.
    ///
    /// Fails if the operating system refuses to create a worker; workers
    /// already started are shut down first.
    pub fn new(thread_count: usize) -> Result<Self> {
        let mut pool = WorkerPool {
            worker_threads: Vec::with_capacity(thread_count),
            shared_data: Arc::new(Mutex::new(PoolSharedData::new())),
            task_available: Arc::new(Condvar::new()),
        };

        // Spawn worker threads that wait for tasks to be added to the task
        // queue.
        for worker_id in 0..thread_count {
            let shared_data = pool.shared_data.clone();
            let task_condvar = pool.task_available.clone();
            let handle = thread::Builder::new()
                .name(format!("parsum-pool-{worker_id}"))
                .spawn(move || {
                    worker_loop(worker_id, &shared_data, &task_condvar)
                })?;
            pool.worker_threads.push(handle);
        }

        debug!(workers = thread_count, "worker pool started");
        Ok(pool)
    }

    pub fn thread_count(&self) -> usize {
        self.worker_threads.len()
    }

    /// Adds a task to the queue and notifies one waiting worker.
    pub fn submit(&self, task: Arc<dyn Task + Send + Sync>) {
        let mut shared_data_guard = lock(&self.shared_data);
        shared_data_guard.task_queue.push_back(task);
        self.task_available.notify_one();
    }

    /// Signals shutdown without joining the workers. Used when a caller
    /// stops waiting on work that may never finish.
    pub fn detach(mut self) {
        self.signal_shutdown();
        self.worker_threads.clear();
    }

    fn signal_shutdown(&self) {
        let mut shared_data_guard = lock(&self.shared_data);
        shared_data_guard.shutdown_flag = true;
        self.task_available.notify_all();
    }
}

fn worker_loop(
    worker_id: usize,
    shared_data: &Mutex<PoolSharedData>,
    task_condvar: &Condvar,
) {
    loop {
        let task = {
            let mut shared_data_guard = lock(shared_data);

            // Wait until there is a task to process or a shutdown signal.
            while shared_data_guard.task_queue.is_empty()
                && !shared_data_guard.shutdown_flag
            {
                shared_data_guard = task_condvar
                    .wait(shared_data_guard)
                    .unwrap_or_else(|e| e.into_inner());
            }

            // Break the loop if shutdown flag is set.
            if shared_data_guard.shutdown_flag {
                break;
            }

            // Remove the task from the front of the queue.
            match shared_data_guard.task_queue.pop_front() {
                Some(task) => task,
                None => continue,
            }
        };

        // Execute the task outside the lock scope. A panicking task must not
        // take the worker down with it.
        if let Err(payload) =
            panic::catch_unwind(AssertUnwindSafe(|| task.execute()))
        {
            warn!(
                worker_id,
                error = %panic_message(payload.as_ref()),
                "pool task panicked"
            );
        }
    }
}

impl Drop for WorkerPool {
    /// Signals the workers to shut down and waits for them to exit.
    fn drop(&mut self) {
        self.signal_shutdown();
        for handle in self.worker_threads.drain(..) {
            let _ = handle.join();
        }
    }
}
