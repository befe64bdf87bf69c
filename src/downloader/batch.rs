//! Batch submission and collection

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::downloader::task::{self, TaskContext};
use crate::downloader::MediaDownloader;
use crate::error::{Error, Result};
use crate::platform;
use crate::types::{DownloadRequest, Outcome, TaskId, TaskState};

/// Handle to one submitted download task
pub struct TaskHandle {
    /// Id assigned at submission, usable with `cancel` and `task_state`
    pub id: TaskId,
    /// URL the task was submitted for
    pub url: String,
    join: JoinHandle<Outcome>,
}

impl MediaDownloader {
    /// Submit a batch of download requests
    ///
    /// Returns immediately after spawning one task per request. Tokens and
    /// `Queued` states are registered before any task is spawned, so a
    /// `cancel` against a returned id always lands. Fails with
    /// [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown).
    pub async fn submit_batch(
        &self,
        requests: Vec<DownloadRequest>,
    ) -> Result<Vec<TaskHandle>> {
        if !self.tasks.is_accepting() {
            return Err(Error::ShuttingDown);
        }

        tracing::info!(count = requests.len(), "Submitting download batch");

        let mut prepared = Vec::with_capacity(requests.len());
        {
            let mut active = self.tasks.active.lock().await;
            let mut states = self.tasks.states.lock().await;
            for request in requests {
                let id = self.tasks.allocate_id();
                let token = CancellationToken::new();
                active.insert(id, token.clone());
                states.insert(id, TaskState::Queued);
                prepared.push((id, token, request));
            }
        }

        let handles = prepared
            .into_iter()
            .map(|(id, token, request)| {
                let url = request.url.clone();
                let ctx = TaskContext {
                    task_id: id,
                    request,
                    engine: self.engine.clone(),
                    history: self.history.clone(),
                    tasks: self.tasks.clone(),
                    progress_tx: self.progress_tx.clone(),
                    token,
                    socket_timeout_secs: self.config.timeout,
                };
                TaskHandle {
                    id,
                    url,
                    join: tokio::spawn(task::run_task(ctx)),
                }
            })
            .collect();

        Ok(handles)
    }

    /// Submit a single request and wait for its outcome
    pub async fn download(&self, request: DownloadRequest) -> Result<Outcome> {
        let handles = self.submit_batch(vec![request]).await?;
        let mut outcomes = Self::await_all(handles).await;
        outcomes
            .pop()
            .ok_or_else(|| Error::Other("download task vanished".to_string()))
    }

    /// Wait for every handle, returning outcomes in submission order
    ///
    /// Completion order does not matter. A panicked task yields a synthetic
    /// failed outcome instead of aborting its siblings.
    pub async fn await_all(handles: Vec<TaskHandle>) -> Vec<Outcome> {
        let (meta, joins): (Vec<_>, Vec<_>) = handles
            .into_iter()
            .map(|h| ((h.id, h.url), h.join))
            .unzip();

        futures::future::join_all(joins)
            .await
            .into_iter()
            .zip(meta)
            .map(|(result, (id, url))| match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(task_id = %id, error = %e, "Download task panicked");
                    Outcome::failure(
                        platform::classify(&url),
                        url,
                        format!("task aborted: {e}"),
                    )
                }
            })
            .collect()
    }
}
