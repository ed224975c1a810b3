// SPDX-License-Identifier: MIT

use crate::error::{panic_message, Result};
use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender,
};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;
use tracing::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Why a task did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("task was dropped before it ran")]
    Dropped,
    #[error("task did not finish before the deadline")]
    TimedOut,
}

/// Handle to the eventual result of a submitted task.
pub struct TaskHandle<T> {
    result: Receiver<std::result::Result<T, TaskError>>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task finishes.
    pub fn join(self) -> std::result::Result<T, TaskError> {
        self.result.recv().unwrap_or(Err(TaskError::Dropped))
    }

    /// Blocks until the task finishes or `deadline` passes.
    pub fn join_until(
        self,
        deadline: Instant,
    ) -> std::result::Result<T, TaskError> {
        match self.result.recv_deadline(deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(TaskError::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(TaskError::Dropped),
        }
    }
}

/// Fixed set of workers fed through a bounded queue.
///
/// [`spawn`](Self::spawn) blocks while the queue is full, so at most
/// `capacity` tasks wait for a worker at any time.
pub struct TaskQueue {
    jobs: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl TaskQueue {
    pub fn new(worker_count: usize, capacity: usize) -> Result<Self> {
        let (jobs, queue) = bounded::<Job>(capacity);
        let mut task_queue = TaskQueue {
            jobs: Some(jobs),
            workers: Vec::with_capacity(worker_count),
        };

        for worker_id in 0..worker_count {
            let queue = queue.clone();
            let handle = thread::Builder::new()
                .name(format!("parsum-task-{worker_id}"))
                .spawn(move || {
                    // The queue disconnects once every sender is gone.
                    for job in queue.iter() {
                        job();
                    }
                })?;
            task_queue.workers.push(handle);
        }

        debug!(workers = worker_count, capacity, "task queue started");
        Ok(task_queue)
    }

    /// Queues `work` and returns a handle to its result.
    pub fn spawn<T, F>(&self, work: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (job, handle) = package(work);
        if let Some(jobs) = &self.jobs {
            // A send error drops the job, which disconnects the handle.
            let _ = jobs.send(job);
        }
        handle
    }

    /// Like [`spawn`](Self::spawn), but gives up with
    /// [`TaskError::TimedOut`] if the queue is still full at `deadline`.
    pub fn spawn_until<T, F>(
        &self,
        work: F,
        deadline: Option<Instant>,
    ) -> std::result::Result<TaskHandle<T>, TaskError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let Some(deadline) = deadline else {
            return Ok(self.spawn(work));
        };
        let (job, handle) = package(work);
        if let Some(jobs) = &self.jobs {
            if let Err(SendTimeoutError::Timeout(_)) =
                jobs.send_deadline(job, deadline)
            {
                return Err(TaskError::TimedOut);
            }
        }
        Ok(handle)
    }

    /// Closes the queue without joining the workers.
    pub fn detach(mut self) {
        self.jobs.take();
        self.workers.clear();
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.jobs.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Wraps `work` into a queueable job that reports through the returned
/// handle.
fn package<T, F>(work: F) -> (Job, TaskHandle<T>)
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (result_tx, result) = bounded(1);
    let job: Job = Box::new(move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(work))
            .map_err(|payload| {
                TaskError::Panicked(panic_message(payload.as_ref()))
            });
        // The handle may already be gone.
        let _ = result_tx.send(outcome);
    });
    (job, TaskHandle { result })
}

/// Waits for every handle, in order, returning each outcome.
pub fn wait_all<T>(
    handles: Vec<TaskHandle<T>>,
    deadline: Option<Instant>,
) -> Vec<std::result::Result<T, TaskError>> {
    handles
        .into_iter()
        .map(|handle| match deadline {
            Some(deadline) => handle.join_until(deadline),
            None => handle.join(),
        })
        .collect()
}
