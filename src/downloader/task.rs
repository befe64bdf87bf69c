//! Per-task runner: permit acquisition, retry loop, terminal bookkeeping

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::downloader::events::ProgressMsg;
use crate::downloader::TaskTable;
use crate::engine::{EngineOptions, MediaEngine};
use crate::history::History;
use crate::platform;
use crate::types::{DownloadRequest, Outcome, TaskId, TaskState};

/// Everything one spawned task needs, bundled so the spawn site stays small
pub(crate) struct TaskContext {
    pub task_id: TaskId,
    pub request: DownloadRequest,
    pub engine: Arc<dyn MediaEngine>,
    pub history: Arc<History>,
    pub tasks: Arc<TaskTable>,
    pub progress_tx: mpsc::UnboundedSender<ProgressMsg>,
    pub token: CancellationToken,
    pub socket_timeout_secs: u64,
}

/// Run one download task to its terminal outcome
///
/// Waits for a permit from the batch's semaphore (racing cancellation), then
/// drives the retry loop. Exactly one terminal outcome is produced and
/// recorded no matter which path exits.
pub(crate) async fn run_task(ctx: TaskContext) -> Outcome {
    let site = platform::classify(&ctx.request.url);
    let limiter = ctx.tasks.current_limiter().await;

    let _permit = tokio::select! {
        _ = ctx.token.cancelled() => {
            tracing::info!(task_id = %ctx.task_id, url = %ctx.request.url, "Cancelled while queued");
            let outcome = Outcome::cancelled(site, ctx.request.url.clone());
            return finalize(&ctx, TaskState::Cancelled, outcome).await;
        }
        permit = limiter.acquire_owned() => match permit {
            Ok(permit) => permit,
            // Semaphore closed only happens if the limiter was torn down
            Err(_) => {
                let outcome =
                    Outcome::failure(site, ctx.request.url.clone(), "scheduler unavailable".to_string());
                return finalize(&ctx, TaskState::Failed(outcome.clone()), outcome).await;
            }
        }
    };

    let options = EngineOptions::from_request(&ctx.request, site)
        .with_socket_timeout(ctx.socket_timeout_secs);
    let mut last_error = String::new();

    for attempt in 1..=ctx.request.retry_limit {
        // Cancellation is cooperative and only honored between attempts; a
        // running subprocess is never killed mid-transfer
        if ctx.token.is_cancelled() {
            tracing::info!(task_id = %ctx.task_id, attempt, "Cancelled between attempts");
            let outcome = Outcome::cancelled(site, ctx.request.url.clone());
            return finalize(&ctx, TaskState::Cancelled, outcome).await;
        }

        ctx.tasks
            .set_state(ctx.task_id, TaskState::Running { attempt })
            .await;
        tracing::info!(
            task_id = %ctx.task_id,
            url = %ctx.request.url,
            attempt,
            limit = ctx.request.retry_limit,
            "Starting download attempt"
        );

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let forward_tx = ctx.progress_tx.clone();
        let task_id = ctx.task_id;
        let forwarder = tokio::spawn(async move {
            while let Some(raw) = raw_rx.recv().await {
                let _ = forward_tx.send(ProgressMsg::Raw { task_id, raw });
            }
        });

        let result = ctx.engine.fetch(&ctx.request.url, &options, raw_tx).await;
        let _ = forwarder.await;

        match result {
            Ok(info) => {
                tracing::info!(task_id = %ctx.task_id, title = %info.title, "Download succeeded");
                let outcome = Outcome::success(
                    site,
                    info.title,
                    ctx.request.url.clone(),
                    info.output_dir,
                );
                return finalize(&ctx, TaskState::Succeeded(outcome.clone()), outcome).await;
            }
            Err(e) => {
                tracing::warn!(
                    task_id = %ctx.task_id,
                    attempt,
                    error = %e,
                    "Download attempt failed"
                );
                last_error = e.to_string();
            }
        }
    }

    tracing::error!(
        task_id = %ctx.task_id,
        url = %ctx.request.url,
        error = %last_error,
        "Download failed after all attempts"
    );
    let outcome = Outcome::failure(site, ctx.request.url.clone(), last_error);
    finalize(&ctx, TaskState::Failed(outcome.clone()), outcome).await
}

/// Publish the terminal state, record history and unregister the task
async fn finalize(ctx: &TaskContext, state: TaskState, outcome: Outcome) -> Outcome {
    ctx.tasks.set_state(ctx.task_id, state).await;
    ctx.tasks.unregister(ctx.task_id).await;
    let _ = ctx.progress_tx.send(ProgressMsg::Done {
        task_id: ctx.task_id,
    });

    // History must never fail the download it records
    if let Err(e) = ctx.history.append(&outcome).await {
        tracing::warn!(task_id = %ctx.task_id, error = %e, "Failed to record history");
    }

    outcome
}
