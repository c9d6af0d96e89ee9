//! Task executors for asynchronous dispatch.
//!
//! The dispatcher never spawns work itself. It hands a boxed future to a
//! [`TaskExecutor`] chosen at construction time, so tests can substitute a
//! [`DeferredExecutor`] and run scheduled work at a point of their choosing.

use crate::error::describe_panic;
use futures::{future::BoxFuture, FutureExt};
use std::{
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Runs detached units of work.
pub trait TaskExecutor: Send + Sync {
    /// Schedule `task` and return without waiting for it.
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

// ============================================================================
// Tokio
// ============================================================================

/// Executor that runs each task on the tokio runtime.
///
/// A panic inside a task is caught and logged; it never reaches the caller,
/// sibling tasks or the runtime. In-flight tasks are tracked so shutdown can
/// wait for them with [`TokioExecutor::drain`].
#[derive(Debug, Clone, Default)]
pub struct TokioExecutor {
    tracker: TaskTracker,
}

impl TokioExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for in-flight tasks to finish, up to `timeout`.
    ///
    /// Returns `true` when every task finished in time. Tasks still running
    /// at the deadline are left to complete on their own.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();

        let in_flight = self.tracker.len();
        if in_flight > 0 {
            info!(in_flight, "Waiting for in-flight dispatches to finish");
        }

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    timeout_secs = timeout.as_secs(),
                    "Timed out waiting for in-flight dispatches"
                );
                false
            }
        }
    }
}

impl TaskExecutor for TokioExecutor {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "No tokio runtime available, dropping scheduled dispatch");
                return;
            }
        };

        self.tracker.spawn_on(
            async move {
                if let Err(payload) = AssertUnwindSafe(task).catch_unwind().await {
                    error!(
                        panic = %describe_panic(payload.as_ref()),
                        "Scheduled dispatch panicked"
                    );
                }
            },
            &handle,
        );
    }
}

// ============================================================================
// Deferred
// ============================================================================

/// Executor that queues tasks until [`DeferredExecutor::run_pending`] is called.
#[derive(Clone, Default)]
pub struct DeferredExecutor {
    queue: Arc<Mutex<Vec<BoxFuture<'static, ()>>>>,
}

impl DeferredExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Run queued tasks to completion, in scheduling order.
    ///
    /// Tasks scheduled while running are run too. A panicking task is logged
    /// and does not stop the rest. Returns the number of tasks run.
    pub async fn run_pending(&self) -> usize {
        let mut ran = 0;

        loop {
            let batch: Vec<_> = {
                let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
                queue.drain(..).collect()
            };
            if batch.is_empty() {
                return ran;
            }

            for task in batch {
                if let Err(payload) = AssertUnwindSafe(task).catch_unwind().await {
                    error!(
                        panic = %describe_panic(payload.as_ref()),
                        "Scheduled dispatch panicked"
                    );
                }
                ran += 1;
            }
        }
    }
}

impl TaskExecutor for DeferredExecutor {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(task);
    }
}

impl std::fmt::Debug for DeferredExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredExecutor")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
