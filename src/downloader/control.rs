//! Runtime control: cancellation, concurrency changes, shutdown

use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::downloader::MediaDownloader;
use crate::error::{Error, Result};
use crate::types::TaskId;

impl MediaDownloader {
    /// Request cancellation of one task
    ///
    /// Returns true when the id was active. Unknown or already-terminal ids
    /// are a no-op; cancellation is cooperative and takes effect at the next
    /// attempt boundary (or immediately while queued).
    pub async fn cancel(&self, id: TaskId) -> bool {
        let active = self.tasks.active.lock().await;
        match active.get(&id) {
            Some(token) => {
                token.cancel();
                tracing::info!(task_id = %id, "Cancellation requested");
                true
            }
            None => {
                tracing::debug!(task_id = %id, "Cancel ignored for unknown or finished task");
                false
            }
        }
    }

    /// Request cancellation of every active task
    pub async fn cancel_all(&self) -> usize {
        let active = self.tasks.active.lock().await;
        for token in active.values() {
            token.cancel();
        }
        let count = active.len();
        if count > 0 {
            tracing::info!(count, "Cancelled all active downloads");
        }
        count
    }

    /// Drop state-table entries for tasks that reached a terminal state
    ///
    /// Returns how many entries were removed. The state table otherwise
    /// grows by one entry per submitted task, so long-lived embedders call
    /// this once they are done inspecting finished tasks; pruned ids become
    /// unknown to [`task_state`](Self::task_state). Queued and running tasks
    /// are never touched.
    pub async fn prune_finished(&self) -> usize {
        let mut states = self.tasks.states.lock().await;
        let before = states.len();
        states.retain(|_, state| !state.is_terminal());
        let pruned = before - states.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned finished task states");
        }
        pruned
    }

    /// Change the concurrency limit for batches submitted from now on
    ///
    /// The semaphore is swapped wholesale; tasks already holding or waiting
    /// on the previous semaphore keep the limit they started with.
    pub async fn set_max_concurrent(&self, max: usize) -> Result<()> {
        if max == 0 {
            return Err(Error::Config {
                message: "concurrency limit must be at least 1".to_string(),
                key: Some("max_concurrent_downloads".to_string()),
            });
        }
        *self.tasks.limiter.write().await = Arc::new(Semaphore::new(max));
        tracing::info!(max, "Concurrency limit updated");
        Ok(())
    }

    /// Stop accepting new batches and cancel everything active
    ///
    /// Already-running attempts finish naturally; callers still holding
    /// handles can `await_all` them to observe the terminal outcomes.
    pub async fn shutdown(&self) {
        self.tasks.stop_accepting();
        let cancelled = self.cancel_all().await;
        tracing::info!(cancelled, "Downloader shutting down");
    }
}
