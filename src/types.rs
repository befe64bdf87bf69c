//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::Config;
use crate::platform::Platform;

/// Unique identifier for a download task
///
/// Assigned by the orchestrator at submission time and stable for the task's
/// lifetime. Used for cancellation and progress correlation.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<TaskId> for u64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Video quality preference
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    /// Best available video + audio
    #[default]
    #[serde(rename = "best")]
    Best,
    /// Capped at 1080p
    #[serde(rename = "1080p")]
    P1080,
    /// Capped at 720p
    #[serde(rename = "720p")]
    P720,
    /// Capped at 480p
    #[serde(rename = "480p")]
    P480,
    /// Capped at 360p
    #[serde(rename = "360p")]
    P360,
}

impl Quality {
    /// String form as accepted by the CLI and the config file
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Best => "best",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "best" => Ok(Quality::Best),
            "1080p" => Ok(Quality::P1080),
            "720p" => Ok(Quality::P720),
            "480p" => Ok(Quality::P480),
            "360p" => Ok(Quality::P360),
            other => Err(format!(
                "invalid quality '{other}' (expected best, 1080p, 720p, 480p or 360p)"
            )),
        }
    }
}

/// Output container format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// MP4 container
    #[default]
    Mp4,
    /// Matroska container
    Mkv,
    /// WebM container
    Webm,
    /// Keep whatever the source delivers (no merge/recode forcing)
    Original,
}

impl Container {
    /// String form as accepted by the CLI and the config file
    pub fn as_str(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mkv => "mkv",
            Container::Webm => "webm",
            Container::Original => "original",
        }
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Container {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(Container::Mp4),
            "mkv" => Ok(Container::Mkv),
            "webm" => Ok(Container::Webm),
            "original" => Ok(Container::Original),
            other => Err(format!(
                "invalid container '{other}' (expected original, mp4, mkv or webm)"
            )),
        }
    }
}

/// A single download request
///
/// Immutable once submitted to the orchestrator. Build one directly or derive
/// it from a [`Config`] with [`DownloadRequest::from_config`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// The video or playlist URL
    pub url: String,
    /// Root output directory (a platform subdirectory is created under it)
    pub output_dir: PathBuf,
    /// Extract audio only (mp3)
    pub audio_only: bool,
    /// Video quality preference (ignored when `audio_only` is set)
    pub quality: Quality,
    /// Output container format (ignored when `audio_only` is set)
    pub container: Container,
    /// Audio bitrate in kbps for audio extraction
    pub audio_bitrate_kbps: u32,
    /// Number of attempts before giving up (minimum 1)
    pub retry_limit: u32,
    /// Browser to source cookies from, passed through to the engine unchanged
    pub cookies_browser: Option<String>,
}

impl DownloadRequest {
    /// Derive a request for `url` from configuration defaults
    pub fn from_config(url: impl Into<String>, config: &Config) -> Self {
        Self {
            url: url.into(),
            output_dir: config.output_dir.clone(),
            audio_only: config.audio_only,
            quality: config.video_quality,
            container: config.format_preference,
            audio_bitrate_kbps: config.audio_quality,
            retry_limit: config.retries.max(1),
            cookies_browser: config.cookies_browser.clone(),
        }
    }
}

/// Task lifecycle state, owned exclusively by the orchestrator
///
/// Transitions are monotonic forward; `Cancelled`, `Succeeded` and `Failed`
/// are terminal and never revisited.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    /// Registered but not yet holding a worker slot
    Queued,
    /// Executing an attempt
    Running {
        /// 1-based attempt counter
        attempt: u32,
    },
    /// Cancelled before producing a successful or failed outcome
    Cancelled,
    /// Terminal success
    Succeeded(Outcome),
    /// Terminal failure after retry exhaustion
    Failed(Outcome),
}

impl TaskState {
    /// Whether this state admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Cancelled | TaskState::Succeeded(_) | TaskState::Failed(_)
        )
    }
}

/// Terminal result of a download task
///
/// Produced exactly once per task, by the task runner, at the terminal
/// transition. Appended to history by the orchestrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Whether the download completed successfully
    pub success: bool,
    /// Platform the URL was classified as
    pub platform: Platform,
    /// Extracted media title ("Unknown" when unavailable)
    pub title: String,
    /// The requested URL
    pub url: String,
    /// Failure message (None on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Directory the output files were written to (None on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// When the task reached its terminal state
    pub completed_at: DateTime<Utc>,
}

impl Outcome {
    /// Successful outcome with the extracted title
    pub fn success(platform: Platform, title: String, url: String, output_dir: PathBuf) -> Self {
        Self {
            success: true,
            platform,
            title,
            url,
            error: None,
            output_dir: Some(output_dir),
            completed_at: Utc::now(),
        }
    }

    /// Failed outcome carrying the last attempt's error message
    pub fn failure(platform: Platform, url: String, error: String) -> Self {
        Self {
            success: false,
            platform,
            title: "Unknown".to_string(),
            url,
            error: Some(error),
            output_dir: None,
            completed_at: Utc::now(),
        }
    }

    /// Synthetic terminal outcome for a cancelled task
    pub fn cancelled(platform: Platform, url: String) -> Self {
        Self::failure(platform, url, "Download cancelled".to_string())
    }
}

/// Download phase a progress event belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Transferring media data
    Downloading,
    /// Merging, recoding or audio extraction after the transfer
    Postprocessing,
    /// Anything else the engine reports
    Other,
}

/// Throttled, observer-facing progress event
///
/// Many may be produced per task; they are broadcast to subscribers and never
/// persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Task this event belongs to
    pub task_id: TaskId,
    /// Download phase
    pub phase: Phase,
    /// File the engine is currently writing
    pub file_name: String,
    /// Parsed percentage in [0, 100], when the raw text contained one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f32>,
    /// Human-readable transfer speed (free-form, ANSI-stripped)
    pub speed: String,
    /// Human-readable ETA (free-form, ANSI-stripped)
    pub eta: String,
    /// The engine's raw status tag ("downloading", "finished", ...)
    pub raw_status: String,
}
