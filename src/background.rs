//! Keep-alive queue for work that outlives the request that started it.
//!
//! Secondary comment writes are handed to [`BackgroundTasks`] instead of
//! a bare `tokio::spawn`, so the server can wait for them during
//! shutdown rather than letting the runtime drop them mid-flight. A
//! semaphore bounds how many run at once; tasks over the limit wait for
//! a permit and are never discarded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

#[derive(Clone)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    permits: Arc<Semaphore>,
}

impl BackgroundTasks {
    #[must_use]
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            tracker: TaskTracker::new(),
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Detach `task`. It runs to completion unless the process exits first;
    /// [`drain`](Self::drain) gives it the chance to finish.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tracker.spawn(async move {
            // The semaphore is never closed, so acquire only fails if that changes.
            let Ok(_permit) = permits.acquire_owned().await else {
                tracing::error!(task = name, "background semaphore closed, task dropped");
                return;
            };
            task.await;
        });
    }

    /// Number of tasks spawned and not yet finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until nothing is pending. Never closes or reopens the queue,
    /// so it cannot undo a concurrent [`drain`](Self::drain). Test support.
    #[doc(hidden)]
    pub async fn flush(&self) {
        while !self.tracker.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Close the queue and wait up to `grace` for pending tasks. Returns
    /// `true` if everything finished in time.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending == 0 {
            return true;
        }

        tracing::info!(pending, grace_ms = grace.as_millis() as u64, "draining background tasks");
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            tracing::info!("background tasks drained");
            true
        } else {
            tracing::warn!(
                abandoned = self.tracker.len(),
                "background drain timed out"
            );
            false
        }
    }
}
