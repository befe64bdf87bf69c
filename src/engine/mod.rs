//! Extraction engine abstraction
//!
//! The actual media extraction/transcoding is delegated to an external
//! engine. This module defines the uniform contract the orchestrator consumes
//! ([`MediaEngine`]) and the deterministic derivation of engine options from
//! a [`DownloadRequest`]. The production adapter lives in [`ytdlp`].

pub mod ytdlp;

pub use ytdlp::YtDlpEngine;

use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::platform::Platform;
use crate::types::DownloadRequest;

/// Raw, unthrottled progress payload produced by an engine
///
/// Field contents are free-form engine text and may contain terminal
/// color-control sequences; the progress throttle cleans them up before
/// anything observer-facing is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawProgress {
    /// Engine status tag ("downloading", "finished", ...)
    pub status: String,
    /// File the engine is currently writing
    pub file_name: String,
    /// Free-form percent text (e.g. " 42.5%")
    pub percent_text: String,
    /// Free-form speed text (e.g. "1.2MiB/s")
    pub speed_text: String,
    /// Free-form ETA text (e.g. "00:42")
    pub eta_text: String,
}

/// Channel half an engine pushes raw progress into during a fetch
pub type RawProgressSender = mpsc::UnboundedSender<RawProgress>;

/// Information extracted from a completed fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaInfo {
    /// Media title as reported by the engine ("Unknown" when unavailable)
    pub title: String,
    /// Directory the output files were written to
    pub output_dir: PathBuf,
}

/// Audio extraction post-processing parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioExtraction {
    /// Target mp3 bitrate in kbps
    pub bitrate_kbps: u32,
}

/// Options handed to the engine, derived deterministically from a request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    /// Engine format selector (e.g. "bestvideo[height<=720]+bestaudio/best")
    pub format: String,
    /// Directory output files land in (`<output_dir>/<platform>`)
    pub output_dir: PathBuf,
    /// Extract audio to mp3 after download
    pub extract_audio: Option<AudioExtraction>,
    /// Force this container via merge/recode (None = keep original)
    pub force_container: Option<String>,
    /// Browser to source cookies from, passed through unchanged
    pub cookies_browser: Option<String>,
    /// Socket timeout in seconds forwarded to the engine
    pub socket_timeout_secs: Option<u64>,
}

impl EngineOptions {
    /// Derive engine options for a request classified as `platform`
    pub fn from_request(request: &DownloadRequest, platform: Platform) -> Self {
        let output_dir = request.output_dir.join(platform.as_str());

        if request.audio_only {
            return Self {
                format: "bestaudio/best".to_string(),
                output_dir,
                extract_audio: Some(AudioExtraction {
                    bitrate_kbps: request.audio_bitrate_kbps,
                }),
                force_container: None,
                cookies_browser: request.cookies_browser.clone(),
                socket_timeout_secs: None,
            };
        }

        let format = match request.quality {
            crate::types::Quality::Best => "bestvideo+bestaudio/best".to_string(),
            capped => {
                let height = match capped {
                    crate::types::Quality::P1080 => 1080,
                    crate::types::Quality::P720 => 720,
                    crate::types::Quality::P480 => 480,
                    _ => 360,
                };
                format!("bestvideo[height<={height}]+bestaudio/best")
            }
        };

        let force_container = match request.container {
            crate::types::Container::Original => None,
            other => Some(other.as_str().to_string()),
        };

        Self {
            format,
            output_dir,
            extract_audio: None,
            force_container,
            cookies_browser: request.cookies_browser.clone(),
            socket_timeout_secs: None,
        }
    }

    /// Set the engine socket timeout
    pub fn with_socket_timeout(mut self, secs: u64) -> Self {
        self.socket_timeout_secs = Some(secs);
        self
    }
}

/// Abstraction over the external extraction engine, enabling testability
///
/// A fetch resolves `url` to downloadable media, writes the output under
/// `options.output_dir` (creating it if absent) and streams raw progress into
/// `progress`. Implementations never retry internally; retry policy belongs
/// to the task runner.
#[async_trait::async_trait]
pub trait MediaEngine: Send + Sync {
    /// Download `url` with the given options
    async fn fetch(
        &self,
        url: &str,
        options: &EngineOptions,
        progress: RawProgressSender,
    ) -> Result<MediaInfo>;
}
