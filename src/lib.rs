//! # media-dl
//!
//! Download orchestration library for media sites, built on yt-dlp.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Concurrent** - Batches of downloads run under a configurable limit
//! - **Cancellable** - Every task gets an id and cooperative cancellation
//! - **Retry-aware** - Transient failures are retried per configuration
//! - **Event-driven** - Consumers subscribe to throttled progress, no polling
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, DownloadRequest, MediaDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None).await;
//!     let downloader = MediaDownloader::new(config.clone()).await?;
//!
//!     // Subscribe to progress events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{}: {:?}", event.file_name, event.percent);
//!         }
//!     });
//!
//!     let request = DownloadRequest::from_config(
//!         "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
//!         &config,
//!     );
//!     let handles = downloader.submit_batch(vec![request]).await?;
//!     for outcome in MediaDownloader::await_all(handles).await {
//!         println!("{}: success={}", outcome.title, outcome.success);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download orchestration
pub mod downloader;
/// Extraction engine trait and yt-dlp adapter
pub mod engine;
/// Error types
pub mod error;
/// Download history persistence
pub mod history;
/// URL platform classification
pub mod platform;
/// Progress throttling and parsing
pub mod progress;
/// Core data types
pub mod types;

pub use config::Config;
pub use downloader::{MediaDownloader, TaskHandle};
pub use engine::{MediaEngine, YtDlpEngine};
pub use error::{Error, Result};
pub use history::{History, HistoryQuery, HistoryRecord, HistoryStats};
pub use platform::Platform;
pub use types::{
    Container, DownloadRequest, Outcome, Phase, ProgressEvent, Quality, TaskId, TaskState,
};
