//! Download orchestration
//!
//! [`MediaDownloader`] is the crate's main entry point: it owns the engine,
//! the history store and all task bookkeeping, and hands out cloneable
//! handles (every field is behind an `Arc` or a channel). Submission is
//! non-blocking; a bounded number of tasks run concurrently under an owned
//! semaphore permit, and throttled progress fans out over a broadcast
//! channel.

mod batch;
mod control;
mod events;
mod task;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use batch::TaskHandle;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::engine::{MediaEngine, YtDlpEngine};
use crate::error::{Error, Result};
use crate::history::History;
use crate::types::{ProgressEvent, TaskId, TaskState};

use events::ProgressMsg;

/// Broadcast buffer size; slow subscribers lose oldest events past this
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Shared task bookkeeping, grouped so orchestration code passes one handle
pub(crate) struct TaskTable {
    /// Cancellation tokens for tasks that have not reached a terminal state
    active: Mutex<HashMap<TaskId, CancellationToken>>,
    /// Last observed state per task, terminal states included
    states: Mutex<HashMap<TaskId, TaskState>>,
    /// Concurrency limiter; swapped wholesale by `set_max_concurrent` so
    /// in-flight batches keep the semaphore they started with
    limiter: RwLock<Arc<Semaphore>>,
    next_task_id: AtomicU64,
    accepting_new: AtomicBool,
}

impl TaskTable {
    fn new(max_concurrent: usize) -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            states: Mutex::new(HashMap::new()),
            limiter: RwLock::new(Arc::new(Semaphore::new(max_concurrent))),
            next_task_id: AtomicU64::new(1),
            accepting_new: AtomicBool::new(true),
        }
    }

    fn allocate_id(&self) -> TaskId {
        TaskId::new(self.next_task_id.fetch_add(1, Ordering::Relaxed))
    }

    fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    fn stop_accepting(&self) {
        self.accepting_new.store(false, Ordering::SeqCst);
    }

    /// Snapshot of the semaphore current batches should draw permits from
    pub(crate) async fn current_limiter(&self) -> Arc<Semaphore> {
        self.limiter.read().await.clone()
    }

    pub(crate) async fn set_state(&self, id: TaskId, state: TaskState) {
        self.states.lock().await.insert(id, state);
    }

    /// Remove the cancellation token once a task reaches a terminal state
    pub(crate) async fn unregister(&self, id: TaskId) {
        self.active.lock().await.remove(&id);
    }
}

/// Orchestrator for concurrent media downloads
///
/// Cheap to clone; all clones share the same engine, history, task table and
/// event channels.
#[derive(Clone)]
pub struct MediaDownloader {
    engine: Arc<dyn MediaEngine>,
    history: Arc<History>,
    config: Config,
    event_tx: broadcast::Sender<ProgressEvent>,
    progress_tx: mpsc::UnboundedSender<ProgressMsg>,
    tasks: Arc<TaskTable>,
}

impl MediaDownloader {
    /// Create an orchestrator using the yt-dlp engine and the default
    /// history location
    pub async fn new(config: Config) -> Result<Self> {
        let engine = YtDlpEngine::discover()?;
        let history_path = Config::default_history_path().ok_or_else(|| {
            Error::Other("cannot determine home directory for history".to_string())
        })?;
        let history = History::open(history_path).await?;
        Self::with_parts(Arc::new(engine), Arc::new(history), config)
    }

    /// Create an orchestrator from explicit parts
    ///
    /// This is the seam tests (and embedders with their own engine) use.
    pub fn with_parts(
        engine: Arc<dyn MediaEngine>,
        history: Arc<History>,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        events::start_dispatcher(progress_rx, event_tx.clone());

        tracing::info!(
            max_concurrent = config.max_concurrent_downloads,
            retries = config.retries,
            "Media downloader initialized"
        );

        Ok(Self {
            engine,
            history,
            tasks: Arc::new(TaskTable::new(config.max_concurrent_downloads)),
            config,
            event_tx,
            progress_tx,
        })
    }

    /// Subscribe to throttled progress events for all tasks
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.event_tx.subscribe()
    }

    /// The configuration this orchestrator was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared history store
    pub fn history(&self) -> &Arc<History> {
        &self.history
    }

    /// Current state of a task, or None for an unknown id
    pub async fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.states.lock().await.get(&id).cloned()
    }
}
