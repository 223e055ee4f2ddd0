//! A bounded pool of OS worker threads.
//!
//! [`WorkerPool`] runs blocking tasks on a dedicated tokio runtime whose blocking thread pool is
//! capped at the configured number of threads. A semaphore bounds the tasks in flight to the
//! running threads plus an equally sized queue. When all permits are taken, the submitting
//! thread runs the task itself, so nothing is dropped and the queue never grows beyond its
//! bound.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// A bounded worker pool collecting the results of its tasks.
#[derive(Debug)]
pub(crate) struct WorkerPool<T> {
    runtime: Runtime,
    slots: Arc<Semaphore>,
    pending: Vec<JoinHandle<T>>,
    completed: Vec<T>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Creates a pool of `threads` worker threads named after `name`.
    pub(crate) fn new(name: &str, threads: usize) -> io::Result<Self> {
        let threads = threads.max(1);
        let runtime = Builder::new_current_thread()
            .thread_name(format!("{name}-worker"))
            .max_blocking_threads(threads)
            .enable_time()
            .build()?;

        Ok(Self {
            runtime,
            // one permit per running task and one per queued task
            slots: Arc::new(Semaphore::new(threads * 2)),
            pending: Vec::new(),
            completed: Vec::new(),
        })
    }

    /// Runs `task` on a worker thread, or on the calling thread if the queue is full.
    pub(crate) fn execute<F>(&mut self, task: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => {
                let handle = self.runtime.spawn_blocking(move || {
                    let output = task();
                    drop(permit);
                    output
                });
                self.pending.push(handle);
            }
            Err(_) => {
                tracing::debug!("worker queue is full, running task on the submitting thread");
                self.completed.push(task());
            }
        }
    }

    /// Number of tasks submitted to worker threads that have not finished yet.
    pub(crate) fn active(&self) -> usize {
        self.pending.iter().filter(|h| !h.is_finished()).count()
    }

    /// Waits for every submitted task, then shuts the pool down.
    ///
    /// Waiting for the tasks blocks the calling thread until the last one has completed. The
    /// subsequent shutdown waits at most `timeout` for worker threads to exit. Tasks that
    /// panicked are logged and contribute no output.
    pub(crate) fn join(mut self, timeout: Duration) -> Vec<T> {
        let pending = std::mem::take(&mut self.pending);
        let finished = self.runtime.block_on(futures::future::join_all(pending));

        for result in finished {
            match result {
                Ok(output) => self.completed.push(output),
                Err(err) => {
                    tracing::error!(error = &err as &dyn std::error::Error, "worker task failed");
                }
            }
        }

        self.runtime.shutdown_timeout(timeout);
        self.completed
    }
}
