//! Configuration types for media-dl
//!
//! Configuration is an explicit value threaded into the orchestrator at
//! construction; there is no process-wide config state. `load` never fails:
//! a missing or malformed file is logged and replaced with defaults so a bad
//! config can never prevent a download.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{Container, Quality};

/// Main configuration for [`MediaDownloader`](crate::MediaDownloader)
///
/// Serialized as a flat JSON document. Every field has a serde default so a
/// partial config file only overrides the keys it names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root output directory (default: "uDownload")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Extract audio only (mp3) by default
    #[serde(default)]
    pub audio_only: bool,

    /// Video quality preference
    #[serde(default)]
    pub video_quality: Quality,

    /// Audio bitrate in kbps for audio extraction (default: 192)
    #[serde(default = "default_audio_quality")]
    pub audio_quality: u32,

    /// Output container format
    #[serde(default)]
    pub format_preference: Container,

    /// Maximum concurrent downloads (default: 1)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Engine socket timeout in seconds (default: 300)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Number of attempts per download before giving up (default: 3)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Verbose logging (CLI only; the library never installs a subscriber)
    #[serde(default)]
    pub verbose: bool,

    /// Browser to source cookies from for auth-gated platforms
    #[serde(default)]
    pub cookies_browser: Option<String>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("uDownload")
}

fn default_audio_quality() -> u32 {
    192
}

fn default_max_concurrent() -> usize {
    1
}

fn default_timeout() -> u64 {
    300
}

fn default_retries() -> u32 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            audio_only: false,
            video_quality: Quality::default(),
            audio_quality: default_audio_quality(),
            format_preference: Container::default(),
            max_concurrent_downloads: default_max_concurrent(),
            timeout: default_timeout(),
            retries: default_retries(),
            verbose: false,
            cookies_browser: None,
        }
    }
}

impl Config {
    /// Well-known config file location under the user's home directory
    ///
    /// Returns None when the home directory cannot be determined (containers,
    /// stripped-down environments).
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".media-dl").join("config.json"))
    }

    /// Well-known history file location, next to the default config
    pub fn default_history_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".media-dl").join("history.json"))
    }

    /// Load configuration, falling back to defaults on any problem
    ///
    /// Tries `path` first when given, then the default location. A missing,
    /// unreadable or malformed file is logged at warn level and defaults are
    /// used; loading never fails.
    pub async fn load(path: Option<&Path>) -> Self {
        let candidates: Vec<PathBuf> = path
            .map(Path::to_path_buf)
            .into_iter()
            .chain(Self::default_path())
            .collect();

        for candidate in candidates {
            match tokio::fs::read_to_string(&candidate).await {
                Ok(contents) => match serde_json::from_str::<Config>(&contents) {
                    Ok(config) => {
                        tracing::info!(path = %candidate.display(), "Loaded config");
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %candidate.display(),
                            error = %e,
                            "Malformed config file, using defaults"
                        );
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        path = %candidate.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Save configuration as pretty-printed JSON, creating parent directories
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;
        tracing::info!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Create a default config file if none exists yet
    ///
    /// Returns true when a file was written, false when one already existed.
    /// Used by the CLI's `--init-config`.
    pub async fn init_default(path: &Path) -> Result<bool> {
        if tokio::fs::try_exists(path).await? {
            return Ok(false);
        }
        Config::default().save(path).await?;
        Ok(true)
    }

    /// Validate settings that would make the orchestrator misbehave
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be at least 1".to_string(),
                key: Some("max_concurrent_downloads".to_string()),
            });
        }
        if self.retries == 0 {
            return Err(Error::Config {
                message: "retries must be at least 1".to_string(),
                key: Some("retries".to_string()),
            });
        }
        Ok(())
    }
}
