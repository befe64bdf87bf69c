//! Shared fixtures for orchestrator tests

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::Config;
use crate::downloader::MediaDownloader;
use crate::engine::{EngineOptions, MediaEngine, MediaInfo, RawProgress, RawProgressSender};
use crate::error::{Error, Result};
use crate::history::History;
use crate::types::DownloadRequest;

/// Scripted in-process engine with concurrency instrumentation
///
/// Each fetch consumes the next scripted step (an empty script means every
/// fetch succeeds), sleeps for the configured delay and tracks how many
/// fetches overlapped.
pub(crate) struct FakeEngine {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    progress: Vec<RawProgress>,
}

impl FakeEngine {
    /// Engine where every fetch succeeds with title "Fake Video"
    pub(crate) fn always_ok() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: Duration::from_millis(0),
            script: Mutex::new(VecDeque::new()),
            progress: Vec::new(),
        }
    }

    /// Engine following a script: `Ok(title)` succeeds, `Err(msg)` fails
    ///
    /// Fetches past the end of the script succeed.
    pub(crate) fn scripted(
        steps: impl IntoIterator<Item = std::result::Result<String, String>>,
    ) -> Self {
        let mut engine = Self::always_ok();
        engine.script = Mutex::new(steps.into_iter().collect());
        engine
    }

    /// Engine that always fails with `message`
    pub(crate) fn always_failing(message: &str) -> Self {
        let mut engine = Self::always_ok();
        engine.script = Mutex::new(
            std::iter::repeat(Err(message.to_string()))
                .take(100)
                .collect(),
        );
        engine
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Raw progress events pushed during every fetch
    pub(crate) fn with_progress(mut self, progress: Vec<RawProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches that were ever in flight simultaneously
    pub(crate) fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MediaEngine for FakeEngine {
    async fn fetch(
        &self,
        _url: &str,
        options: &EngineOptions,
        progress: RawProgressSender,
    ) -> Result<MediaInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        for raw in &self.progress {
            let _ = progress.send(raw.clone());
        }
        tokio::time::sleep(self.delay).await;

        let step = self.script.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match step {
            Some(Ok(title)) => Ok(MediaInfo {
                title,
                output_dir: options.output_dir.clone(),
            }),
            Some(Err(message)) => Err(Error::Engine(message)),
            None => Ok(MediaInfo {
                title: "Fake Video".to_string(),
                output_dir: options.output_dir.clone(),
            }),
        }
    }
}

/// Config suitable for tests: output into the given temp dir, no retries
/// beyond what a test asks for
pub(crate) fn test_config(dir: &tempfile::TempDir) -> Config {
    Config {
        output_dir: dir.path().join("out"),
        retries: 1,
        ..Config::default()
    }
}

/// Build a downloader over a fake engine with history inside a temp dir
pub(crate) async fn create_test_downloader(
    engine: Arc<FakeEngine>,
    config: Config,
    dir: &tempfile::TempDir,
) -> MediaDownloader {
    let history = History::open(dir.path().join("history.json")).await.unwrap();
    MediaDownloader::with_parts(engine, Arc::new(history), config).unwrap()
}

/// Request for `url` derived from `config`
pub(crate) fn request(url: &str, config: &Config) -> DownloadRequest {
    DownloadRequest::from_config(url, config)
}
