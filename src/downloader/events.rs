//! Progress fan-in and dispatch
//!
//! Workers push raw engine progress into an unbounded mpsc channel; a single
//! dispatcher task owns the throttle state and publishes the surviving events
//! on the broadcast channel. Single ownership means the throttle map needs no
//! locking, and events from concurrent workers are serialized in arrival
//! order.

use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::engine::RawProgress;
use crate::progress::ProgressThrottle;
use crate::types::{ProgressEvent, TaskId};

/// Message from a worker to the dispatcher
pub(crate) enum ProgressMsg {
    /// Raw engine progress for a running task
    Raw { task_id: TaskId, raw: RawProgress },
    /// The task reached a terminal state; drop its throttle state
    Done { task_id: TaskId },
}

/// Spawn the dispatcher task
///
/// Runs until every worker-side sender is dropped. Broadcast send errors mean
/// no subscriber exists right now, which is fine.
pub(crate) fn start_dispatcher(
    mut rx: mpsc::UnboundedReceiver<ProgressMsg>,
    tx: broadcast::Sender<ProgressEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut throttle = ProgressThrottle::new();
        while let Some(msg) = rx.recv().await {
            match msg {
                ProgressMsg::Raw { task_id, raw } => {
                    if let Some(event) = throttle.observe(task_id, &raw, Instant::now()) {
                        let _ = tx.send(event);
                    }
                }
                ProgressMsg::Done { task_id } => throttle.forget_task(task_id),
            }
        }
        tracing::debug!("Progress dispatcher stopped");
    })
}
