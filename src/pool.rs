//! Fixed-size worker pool for CPU-bound post-processing.
//!
//! [`WorkerPool`] owns a set of threads that pull boxed tasks from one shared
//! FIFO queue. [`submit`](WorkerPool::submit) returns a [`TaskHandle`] that
//! resolves to the task's value. A panicking task is caught on the worker, so
//! the worker keeps running and the handle reports
//! [`AnalyzerError::TaskPanicked`].
//!
//! Shutdown drains: workers finish their current task and everything still
//! queued before exiting, and [`shutdown`](WorkerPool::shutdown) joins all of
//! them.
//!
//! # Example
//!
//! ```
//! use streamscope::WorkerPool;
//!
//! let pool = WorkerPool::new(4)?;
//! let handle = pool.submit(|| 6 * 7)?;
//! assert_eq!(handle.join()?, 42);
//! # Ok::<(), streamscope::AnalyzerError>(())
//! ```

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::engine::resolve_thread_count;
use crate::error::AnalyzerError;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    active: usize,
    stopping: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    /// Signalled when a job is queued or shutdown begins.
    work_available: Condvar,
    /// Signalled when the queue is empty and no job is running.
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Jobs never run under this lock; a poisoned queue is still consistent.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Pending result of a task submitted to a [`WorkerPool`].
#[derive(Debug)]
pub struct TaskHandle<T> {
    receiver: Receiver<Result<T, String>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task has run and return its value.
    ///
    /// # Errors
    ///
    /// [`AnalyzerError::TaskPanicked`] if the task panicked or was never run.
    pub fn join(self) -> Result<T, AnalyzerError> {
        match self.receiver.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(AnalyzerError::TaskPanicked(message)),
            Err(_) => Err(AnalyzerError::TaskPanicked(
                "task dropped before completion".to_string(),
            )),
        }
    }
}

/// Bounded set of worker threads executing submitted closures.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    thread_count: usize,
}

impl WorkerPool {
    /// Spawn a pool. `0` auto-detects the hardware concurrency; larger
    /// requests are clamped to it.
    ///
    /// # Errors
    ///
    /// [`AnalyzerError::IoError`] if a worker thread cannot be spawned. Workers
    /// already started are joined before returning.
    pub fn new(threads: usize) -> Result<Self, AnalyzerError> {
        Self::spawn(resolve_thread_count(threads), None)
    }

    fn spawn(thread_count: usize, stack_size: Option<usize>) -> Result<Self, AnalyzerError> {
        let shared = Arc::new(Shared::default());
        let mut workers = Vec::with_capacity(thread_count);

        for index in 0..thread_count {
            let mut builder = thread::Builder::new().name(format!("streamscope-worker-{index}"));
            if let Some(size) = stack_size {
                builder = builder.stack_size(size);
            }

            let worker_shared = Arc::clone(&shared);
            match builder.spawn(move || worker_loop(&worker_shared)) {
                Ok(handle) => workers.push(handle),
                Err(error) => {
                    log::error!("Failed to spawn pool worker {index}: {error}");
                    shared.lock().stopping = true;
                    shared.work_available.notify_all();
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(error.into());
                }
            }
        }

        log::debug!("Worker pool started with {thread_count} threads");

        Ok(Self {
            shared,
            thread_count,
            workers: Mutex::new(workers),
        })
    }

    /// Number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Queue a task and return a handle to its result.
    ///
    /// # Errors
    ///
    /// [`AnalyzerError::PoolClosed`] once shutdown has begun.
    pub fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, AnalyzerError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(1);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task)).map_err(panic_message);
            // The caller may have dropped the handle.
            let _ = sender.send(outcome);
        });

        {
            let mut state = self.shared.lock();
            if state.stopping {
                return Err(AnalyzerError::PoolClosed);
            }
            state.jobs.push_back(job);
        }
        self.shared.work_available.notify_one();

        Ok(TaskHandle { receiver })
    }

    /// Block until the queue is empty and no task is running.
    ///
    /// Tasks submitted concurrently with this call may or may not be waited
    /// for.
    pub fn wait_all(&self) {
        let state = self.shared.lock();
        let _idle = self
            .shared
            .idle
            .wait_while(state, |state| !state.jobs.is_empty() || state.active > 0)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
    }

    /// Stop accepting tasks, let workers drain the queue, and join them.
    ///
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.lock();
            if state.stopping {
                return;
            }
            state.stopping = true;
        }
        self.shared.work_available.notify_all();

        let workers = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for worker in workers {
            if worker.join().is_err() {
                log::warn!("Pool worker exited abnormally");
            }
        }
        log::debug!("Worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = {
            let state = shared.lock();
            let mut state = shared
                .work_available
                .wait_while(state, |state| state.jobs.is_empty() && !state.stopping)
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            match state.jobs.pop_front() {
                Some(job) => {
                    state.active += 1;
                    job
                }
                // Stopping with an empty queue.
                None => return,
            }
        };

        job();

        let mut state = shared.lock();
        state.active -= 1;
        if state.jobs.is_empty() && state.active == 0 {
            shared.idle.notify_all();
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    #[test]
    fn spawn_failure_is_reported() {
        // A 1 PiB stack cannot be mapped in a 47-bit address space.
        let result = WorkerPool::spawn(2, Some(1 << 50));
        assert!(matches!(result, Err(AnalyzerError::IoError(_))));
    }

    #[test]
    fn spawned_pool_reports_real_thread_count() {
        let pool = WorkerPool::spawn(3, None).expect("Failed to spawn pool");
        assert_eq!(pool.thread_count(), 3);
        assert_eq!(pool.workers.lock().expect("Failed to lock workers").len(), 3);
    }
}
