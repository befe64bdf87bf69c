//! yt-dlp subprocess adapter
//!
//! Runs the external `yt-dlp` binary with `--newline` so progress arrives as
//! discrete stdout lines, parses those lines into [`RawProgress`] events and
//! maps a non-zero exit into an engine error carrying the stderr tail.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::engine::{EngineOptions, MediaEngine, MediaInfo, RawProgress, RawProgressSender};
use crate::error::{Error, Result};

/// Lines of stderr kept for error reporting
const STDERR_TAIL_LINES: usize = 20;

// "[download] Destination: downloads/YouTube/Some Title.mp4"
static DESTINATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\[(?:download|ExtractAudio|Merger|VideoConvertor)\][^:]*(?:Destination|into):?\s+\x22?(?P<path>[^\x22]+?)\x22?\s*$")
        .expect("static regex must compile")
});

// "[download]  42.5% of 300.00MiB at 1.20MiB/s ETA 00:42"
static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(
        r"\[download\]\s+(?P<percent>\S+%)\s+of\s+~?\S+(?:\s+at\s+(?P<speed>\S+))?(?:\s+ETA\s+(?P<eta>\S+))?",
    )
    .expect("static regex must compile")
});

/// [`MediaEngine`] implementation shelling out to yt-dlp
#[derive(Clone, Debug)]
pub struct YtDlpEngine {
    binary: PathBuf,
}

impl YtDlpEngine {
    /// Locate yt-dlp on PATH
    ///
    /// Fails with [`Error::EngineNotFound`] when the binary is absent, so the
    /// problem surfaces at construction instead of on the first download.
    pub fn discover() -> Result<Self> {
        let binary = which::which("yt-dlp")
            .map_err(|_| Error::EngineNotFound("yt-dlp".to_string()))?;
        tracing::debug!(binary = %binary.display(), "Located yt-dlp");
        Ok(Self { binary })
    }

    /// Use an explicit binary path, bypassing PATH lookup
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Build the full yt-dlp argument vector for one fetch
    fn build_args(url: &str, options: &EngineOptions) -> Vec<String> {
        let mut args = vec![
            "--newline".to_string(),
            "-o".to_string(),
            options
                .output_dir
                .join("%(title)s.%(ext)s")
                .to_string_lossy()
                .into_owned(),
            "-f".to_string(),
            options.format.clone(),
        ];

        if let Some(audio) = &options.extract_audio {
            args.push("-x".to_string());
            args.push("--audio-format".to_string());
            args.push("mp3".to_string());
            args.push("--audio-quality".to_string());
            args.push(format!("{}K", audio.bitrate_kbps));
        } else if let Some(container) = &options.force_container {
            args.push("--merge-output-format".to_string());
            args.push(container.clone());
            args.push("--recode-video".to_string());
            args.push(container.clone());
        }

        if let Some(browser) = &options.cookies_browser {
            args.push("--cookies-from-browser".to_string());
            args.push(browser.clone());
        }

        if let Some(secs) = options.socket_timeout_secs {
            args.push("--socket-timeout".to_string());
            args.push(secs.to_string());
        }

        args.push(url.to_string());
        args
    }

    /// Interpret one stdout line; updates `file_name`/`title` on destination
    /// lines and returns a progress event for download-status lines
    fn parse_line(
        line: &str,
        file_name: &mut String,
        title: &mut Option<String>,
    ) -> Option<RawProgress> {
        let clean = crate::progress::strip_ansi(line);

        if let Some(caps) = DESTINATION_RE.captures(&clean) {
            let path = Path::new(caps["path"].trim());
            if let Some(name) = path.file_name() {
                *file_name = name.to_string_lossy().into_owned();
            }
            if let Some(stem) = path.file_stem() {
                *title = Some(stem.to_string_lossy().into_owned());
            }
            return None;
        }

        if let Some(caps) = PROGRESS_RE.captures(&clean) {
            let status = if clean.contains("100%") && clean.contains(" in ") {
                "finished"
            } else {
                "downloading"
            };
            return Some(RawProgress {
                status: status.to_string(),
                file_name: file_name.clone(),
                percent_text: caps["percent"].to_string(),
                speed_text: caps
                    .name("speed")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                eta_text: caps
                    .name("eta")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            });
        }

        None
    }
}

#[async_trait::async_trait]
impl MediaEngine for YtDlpEngine {
    async fn fetch(
        &self,
        url: &str,
        options: &EngineOptions,
        progress: RawProgressSender,
    ) -> Result<MediaInfo> {
        tokio::fs::create_dir_all(&options.output_dir).await?;

        let args = Self::build_args(url, options);
        tracing::debug!(binary = %self.binary.display(), ?args, "Spawning yt-dlp");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Engine(format!("failed to spawn yt-dlp: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Engine("yt-dlp stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Engine("yt-dlp stderr unavailable".to_string()))?;

        // Drain stderr concurrently, keeping only a tail for error reporting
        let stderr_task = tokio::spawn(async move {
            let mut tail: Vec<String> = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::trace!(line = %line, "yt-dlp stderr");
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail
        });

        let mut file_name = String::new();
        let mut title: Option<String> = None;

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| Error::Engine(format!("failed to read yt-dlp output: {e}")))?
        {
            tracing::trace!(line = %line, "yt-dlp stdout");
            if let Some(raw) = Self::parse_line(&line, &mut file_name, &mut title) {
                // Receiver gone means nobody is watching; keep downloading
                let _ = progress.send(raw);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::Engine(format!("failed to wait for yt-dlp: {e}")))?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let detail = if stderr_tail.is_empty() {
                format!("yt-dlp exited with {status}")
            } else {
                format!("yt-dlp exited with {status}: {}", stderr_tail.join(" | "))
            };
            return Err(Error::Engine(detail));
        }

        Ok(MediaInfo {
            title: title.unwrap_or_else(|| "Unknown".to_string()),
            output_dir: options.output_dir.clone(),
        })
    }
}
