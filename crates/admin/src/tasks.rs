//! Background task registry.
//!
//! Every timer-driven job (backup progress, the backup scheduler, the
//! notification feed, persistence flushes) is spawned through
//! [`BackgroundTasks`], which tracks the handles and shares one
//! cancellation token so shutdown can stop them all.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Kind of background task, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Runs once and finishes (e.g. a backup run).
    Job,
    /// Long-lived loop on an interval (e.g. the scheduler).
    Periodic,
    /// Long-lived consumer of an external source (e.g. the real-time feed).
    Listener,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Job => write!(f, "job"),
            Self::Periodic => write!(f, "periodic"),
            Self::Listener => write!(f, "listener"),
        }
    }
}

/// Tracked, cancellable set of background tasks.
///
/// Cheap to clone; clones share the same tracker and token.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that long-running tasks select on to stop.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Whether shutdown has started.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Spawn and track a task.
    ///
    /// Panics inside the task are caught and logged. Long-lived kinds that
    /// return before shutdown are logged as unexpected.
    pub fn spawn<F>(&self, name: &'static str, kind: TaskKind, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let wrapped = async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) => {
                    if kind != TaskKind::Job && !shutdown.is_cancelled() {
                        tracing::warn!(task = %name, kind = %kind, "Background task completed unexpectedly");
                    }
                }
                Err(panic_info) => {
                    let panic_msg = panic_info
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic_info.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "Unknown panic".to_string());
                    tracing::error!(task = %name, kind = %kind, panic = %panic_msg, "Background task panicked");
                }
            }
        };

        self.tracker.spawn(wrapped);
        tracing::debug!(task = %name, kind = %kind, "Registered background task");
    }

    /// Number of tasks still running.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    /// Whether no task is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Wait until every tracked task has finished, without cancelling.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancel everything and wait up to `timeout` for tasks to finish.
    pub async fn shutdown(&self, timeout: Duration) {
        tracing::info!(running = self.tracker.len(), "Stopping background tasks");
        self.shutdown.cancel();
        self.tracker.close();

        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                running = self.tracker.len(),
                "Background tasks did not stop before timeout"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_wait_idle_waits_for_jobs() {
        let tasks = BackgroundTasks::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            tasks.spawn("increment", TaskKind::Job, async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tasks.wait_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_periodic_tasks() {
        let tasks = BackgroundTasks::new();
        let token = tasks.shutdown_token();

        tasks.spawn("loop", TaskKind::Periodic, async move {
            token.cancelled().await;
        });

        tasks.shutdown(Duration::from_secs(1)).await;
        assert!(tasks.is_shutting_down());
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_task_is_contained() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("boom", TaskKind::Job, async {
            panic!("boom");
        });
        tasks.wait_idle().await;
        assert!(tasks.is_empty());
    }
}
