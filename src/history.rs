//! Download history persistence
//!
//! An append-only JSON document of terminal outcomes. The orchestrator only
//! talks to the narrow record interface here; the file format is an
//! implementation detail. Read-modify-write cycles are serialized behind an
//! internal mutex so concurrent task completions cannot clobber each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::types::Outcome;

/// One history entry: a terminal [`Outcome`] plus when it was recorded
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// The terminal outcome
    #[serde(flatten)]
    pub outcome: Outcome,
    /// When the record was appended
    pub added_at: DateTime<Utc>,
}

/// Filter for [`History::query`]
#[derive(Clone, Debug, Default)]
pub struct HistoryQuery {
    /// Only records for this platform
    pub platform: Option<Platform>,
    /// Only successful downloads
    pub success_only: bool,
    /// At most this many records (newest first)
    pub limit: Option<usize>,
}

/// Aggregate download statistics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Total number of records
    pub total: usize,
    /// Number of successful downloads
    pub successful: usize,
    /// Number of failed downloads
    pub failed: usize,
    /// Record count per platform
    pub by_platform: HashMap<Platform, usize>,
}

/// Append-only download history backed by a JSON file
pub struct History {
    path: PathBuf,
    /// Serializes read-modify-write cycles across concurrent tasks
    write_lock: Mutex<()>,
}

impl History {
    /// Open (or create) the history store at `path`
    ///
    /// Parent directories are created; a missing file is initialized to an
    /// empty list so later loads always succeed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !tokio::fs::try_exists(&path).await? {
            tokio::fs::write(&path, "[]").await?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Load all records; a malformed or unreadable file yields an empty list
    ///
    /// History must never fail the download it is recording, so corruption is
    /// logged and treated as a fresh log.
    async fn load(&self) -> Vec<HistoryRecord> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(records) => records,
                Err(e) => {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %e,
                        "Malformed history file, treating as empty"
                    );
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read history file, treating as empty"
                );
                Vec::new()
            }
        }
    }

    async fn save(&self, records: &[HistoryRecord]) -> Result<()> {
        let contents = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| Error::History(format!("failed to write history: {e}")))
    }

    /// Append a terminal outcome to the log
    pub async fn append(&self, outcome: &Outcome) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await;
        records.push(HistoryRecord {
            outcome: outcome.clone(),
            added_at: Utc::now(),
        });
        self.save(&records).await?;
        tracing::info!(title = %outcome.title, success = outcome.success, "Added to history");
        Ok(())
    }

    /// Query records, newest first, with optional filters
    pub async fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>> {
        let mut records = self.load().await;

        if let Some(platform) = query.platform {
            records.retain(|r| r.outcome.platform == platform);
        }
        if query.success_only {
            records.retain(|r| r.outcome.success);
        }

        records.reverse();

        if let Some(limit) = query.limit {
            records.truncate(limit);
        }

        Ok(records)
    }

    /// Aggregate statistics over the whole log
    pub async fn stats(&self) -> Result<HistoryStats> {
        let records = self.load().await;

        let total = records.len();
        let successful = records.iter().filter(|r| r.outcome.success).count();
        let mut by_platform: HashMap<Platform, usize> = HashMap::new();
        for record in &records {
            *by_platform.entry(record.outcome.platform).or_default() += 1;
        }

        Ok(HistoryStats {
            total,
            successful,
            failed: total - successful,
            by_platform,
        })
    }

    /// Remove every record
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save(&[]).await?;
        tracing::info!("Download history cleared");
        Ok(())
    }

    /// Remove one record by its position in the underlying log (oldest = 0)
    ///
    /// Returns false when the index is out of range.
    pub async fn remove(&self, index: usize) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await;
        if index >= records.len() {
            return Ok(false);
        }
        records.remove(index);
        self.save(&records).await?;
        Ok(true)
    }

    /// Copy the full log to an external path
    pub async fn export(&self, dest: &Path) -> Result<()> {
        let records = self.load().await;
        let contents = serde_json::to_string_pretty(&records)?;
        tokio::fs::write(dest, contents)
            .await
            .map_err(|e| Error::History(format!("failed to export history: {e}")))?;
        tracing::info!(path = %dest.display(), "Exported history");
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn outcome(platform: Platform, title: &str, success: bool) -> Outcome {
        if success {
            Outcome::success(
                platform,
                title.to_string(),
                format!("https://example.com/{title}"),
                PathBuf::from("out"),
            )
        } else {
            Outcome::failure(
                platform,
                format!("https://example.com/{title}"),
                "network error".to_string(),
            )
        }
    }

    async fn open_temp() -> (History, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let history = History::open(dir.path().join("history.json")).await.unwrap();
        (history, dir)
    }

    #[tokio::test]
    async fn open_creates_parent_dirs_and_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deep").join("nested").join("history.json");
        let history = History::open(&path).await.unwrap();
        assert!(path.exists());
        assert!(history.query(&HistoryQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn query_returns_newest_first_with_limit() {
        let (history, _dir) = open_temp().await;
        history.append(&outcome(Platform::YouTube, "a", true)).await.unwrap();
        history.append(&outcome(Platform::YouTube, "b", true)).await.unwrap();

        let latest = history
            .query(&HistoryQuery {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].outcome.title, "b");
    }

    #[tokio::test]
    async fn query_filters_by_platform_and_success() {
        let (history, _dir) = open_temp().await;
        history.append(&outcome(Platform::YouTube, "yt-ok", true)).await.unwrap();
        history.append(&outcome(Platform::TikTok, "tt-ok", true)).await.unwrap();
        history.append(&outcome(Platform::YouTube, "yt-bad", false)).await.unwrap();

        let youtube = history
            .query(&HistoryQuery {
                platform: Some(Platform::YouTube),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(youtube.len(), 2);

        let youtube_ok = history
            .query(&HistoryQuery {
                platform: Some(Platform::YouTube),
                success_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(youtube_ok.len(), 1);
        assert_eq!(youtube_ok[0].outcome.title, "yt-ok");
    }

    #[tokio::test]
    async fn stats_counts_successes_failures_and_platforms() {
        let (history, _dir) = open_temp().await;
        history.append(&outcome(Platform::YouTube, "ok", true)).await.unwrap();
        history.append(&outcome(Platform::Vimeo, "bad", false)).await.unwrap();

        let stats = history.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.by_platform[&Platform::YouTube], 1);
        assert_eq!(stats.by_platform[&Platform::Vimeo], 1);
    }

    #[tokio::test]
    async fn clear_empties_the_log() {
        let (history, _dir) = open_temp().await;
        history.append(&outcome(Platform::Other, "x", true)).await.unwrap();
        history.clear().await.unwrap();
        assert!(history.query(&HistoryQuery::default()).await.unwrap().is_empty());
        assert_eq!(history.stats().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn remove_by_index_checks_bounds() {
        let (history, _dir) = open_temp().await;
        history.append(&outcome(Platform::Other, "first", true)).await.unwrap();
        history.append(&outcome(Platform::Other, "second", true)).await.unwrap();

        assert!(history.remove(0).await.unwrap());
        assert!(!history.remove(5).await.unwrap());

        let remaining = history.query(&HistoryQuery::default()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].outcome.title, "second");
    }

    #[tokio::test]
    async fn export_copies_records_to_external_path() {
        let (history, dir) = open_temp().await;
        history.append(&outcome(Platform::TikTok, "exported", true)).await.unwrap();

        let dest = dir.path().join("export.json");
        history.export(&dest).await.unwrap();

        let contents = tokio::fs::read_to_string(&dest).await.unwrap();
        let records: Vec<HistoryRecord> = serde_json::from_str(&contents).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome.title, "exported");
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        tokio::fs::write(&path, "{{{{").await.unwrap();

        let history = History::open(&path).await.unwrap();
        assert!(history.query(&HistoryQuery::default()).await.unwrap().is_empty());

        // Appending over a corrupt file starts a fresh log instead of failing
        history.append(&outcome(Platform::Other, "fresh", true)).await.unwrap();
        assert_eq!(history.stats().await.unwrap().total, 1);
    }
}
