//! Progress throttling and raw-text parsing
//!
//! The extraction engine can report progress many times per second; observers
//! (UIs, logs) must not be flooded. [`ProgressThrottle`] keeps per-(task,
//! file) state and decides, per raw event, whether one observer-facing
//! [`ProgressEvent`] is emitted. The free-form engine text may contain ANSI
//! color-escape sequences, so stripping and percent extraction live here as
//! independently testable helpers.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use crate::engine::RawProgress;
use crate::types::{Phase, ProgressEvent, TaskId};

/// Emit percent-less events at most this often per file
const NO_PERCENT_INTERVAL: Duration = Duration::from_millis(800);

/// Heartbeat interval: emit even without a meaningful percent jump
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1200);

/// Minimum percent advance (in points) that forces an emission
const PERCENT_STEP: f32 = 5.0;

static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("static regex must compile")
});

static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("static regex must compile")
});

/// Remove terminal color-control sequences from engine output
pub fn strip_ansi(text: &str) -> String {
    ANSI_RE.replace_all(text, "").into_owned()
}

/// Extract the first `<number>%` pattern from free-form engine text
///
/// The input is ANSI-stripped first; values are clamped to [0, 100].
pub fn parse_percent(text: &str) -> Option<f32> {
    let clean = strip_ansi(text);
    let caps = PERCENT_RE.captures(&clean)?;
    let value: f32 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.clamp(0.0, 100.0))
}

/// Map the engine's raw status tag to an observer-facing phase
fn phase_for(status: &str) -> Phase {
    match status {
        "downloading" => Phase::Downloading,
        "finished" => Phase::Postprocessing,
        _ => Phase::Other,
    }
}

/// Per-file emission state
struct FileProgress {
    /// Percent carried by the last emitted event, if it had one
    last_percent: Option<f32>,
    last_emit: Instant,
}

/// Rate limiter turning the raw engine stream into bounded observer updates
///
/// Owned by the single-consumer progress dispatcher, so no locking is needed
/// even though events originate on many worker tasks. Guarantees observers
/// see the first update for a file, every completion (100%), every ≥5-point
/// advance, and a heartbeat during long stalls.
pub(crate) struct ProgressThrottle {
    files: HashMap<(TaskId, String), FileProgress>,
}

impl ProgressThrottle {
    pub(crate) fn new() -> Self {
        Self {
            files: HashMap::new(),
        }
    }

    /// Evaluate one raw event; returns the event to surface, or None to drop it
    pub(crate) fn observe(
        &mut self,
        task_id: TaskId,
        raw: &RawProgress,
        now: Instant,
    ) -> Option<ProgressEvent> {
        let percent = parse_percent(&raw.percent_text);
        let key = (task_id, raw.file_name.clone());

        let should_emit = match self.files.get(&key) {
            None => true,
            Some(state) => {
                let elapsed = now.duration_since(state.last_emit);
                match (percent, state.last_percent) {
                    // No parseable percent: time-based only
                    (None, _) => elapsed >= NO_PERCENT_INTERVAL,
                    // First numeric percent for this file
                    (Some(_), None) => true,
                    (Some(p), Some(last)) => {
                        p >= 100.0
                            || (p - last) >= PERCENT_STEP
                            || elapsed >= HEARTBEAT_INTERVAL
                    }
                }
            }
        };

        if !should_emit {
            return None;
        }

        let state = self.files.entry(key).or_insert(FileProgress {
            last_percent: None,
            last_emit: now,
        });
        if percent.is_some() {
            state.last_percent = percent;
        }
        state.last_emit = now;

        Some(ProgressEvent {
            task_id,
            phase: phase_for(&raw.status),
            file_name: raw.file_name.clone(),
            percent,
            speed: strip_ansi(&raw.speed_text),
            eta: strip_ansi(&raw.eta_text),
            raw_status: raw.status.clone(),
        })
    }

    /// Drop all per-file state for a completed task
    pub(crate) fn forget_task(&mut self, task_id: TaskId) {
        self.files.retain(|(id, _), _| *id != task_id);
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn raw(percent_text: &str) -> RawProgress {
        RawProgress {
            status: "downloading".to_string(),
            file_name: "video.mp4".to_string(),
            percent_text: percent_text.to_string(),
            speed_text: "1.2MiB/s".to_string(),
            eta_text: "00:42".to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Text parsing helpers
    // -----------------------------------------------------------------------

    #[test]
    fn strip_ansi_removes_color_sequences() {
        assert_eq!(strip_ansi("\x1b[0;94m 42.5%\x1b[0m"), " 42.5%");
        assert_eq!(strip_ansi("plain text"), "plain text");
    }

    #[test]
    fn parse_percent_extracts_first_number() {
        assert_eq!(parse_percent(" 42.5% of 300MiB"), Some(42.5));
        assert_eq!(parse_percent("100%"), Some(100.0));
        assert_eq!(parse_percent("\x1b[0;94m  3.1%\x1b[0m"), Some(3.1));
        assert_eq!(parse_percent("N/A"), None);
        assert_eq!(parse_percent(""), None);
    }

    #[test]
    fn parse_percent_clamps_out_of_range_values() {
        assert_eq!(parse_percent("150%"), Some(100.0));
    }

    #[test]
    fn status_maps_to_phase() {
        assert_eq!(phase_for("downloading"), Phase::Downloading);
        assert_eq!(phase_for("finished"), Phase::Postprocessing);
        assert_eq!(phase_for("error"), Phase::Other);
    }

    // -----------------------------------------------------------------------
    // Emission policy
    // -----------------------------------------------------------------------

    #[test]
    fn scripted_percent_sequence_emits_expected_subsequence() {
        let mut throttle = ProgressThrottle::new();
        let id = TaskId::new(1);
        let now = Instant::now();

        let sequence = [
            0.0, 3.0, 4.0, 5.0, 10.0, 12.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0,
            55.0, 60.0, 65.0, 70.0, 75.0, 80.0, 85.0, 90.0, 95.0, 100.0,
        ];
        let emitted: Vec<f32> = sequence
            .iter()
            .filter_map(|p| throttle.observe(id, &raw(&format!("{p}%")), now))
            .filter_map(|event| event.percent)
            .collect();

        // First event always; 3 and 4 are < 5 points past 0; 12 is < 5 past
        // 10; everything else advances by >= 5; 100 always emits.
        let expected = [
            0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 55.0, 60.0, 65.0,
            70.0, 75.0, 80.0, 85.0, 90.0, 95.0, 100.0,
        ];
        assert_eq!(emitted, expected);
    }

    #[test]
    fn first_event_for_a_file_always_emits() {
        let mut throttle = ProgressThrottle::new();
        let event = throttle.observe(TaskId::new(1), &raw("N/A"), Instant::now());
        assert!(event.is_some());
        assert_eq!(event.unwrap().percent, None);
    }

    #[test]
    fn percent_100_always_emits_even_back_to_back() {
        let mut throttle = ProgressThrottle::new();
        let id = TaskId::new(1);
        let now = Instant::now();

        assert!(throttle.observe(id, &raw("99%"), now).is_some());
        assert!(throttle.observe(id, &raw("100%"), now).is_some());
        assert!(throttle.observe(id, &raw("100%"), now).is_some());
    }

    #[test]
    fn small_advance_within_heartbeat_window_is_suppressed() {
        let mut throttle = ProgressThrottle::new();
        let id = TaskId::new(1);
        let now = Instant::now();

        assert!(throttle.observe(id, &raw("10%"), now).is_some());
        assert!(throttle.observe(id, &raw("11%"), now).is_none());
        assert!(throttle.observe(id, &raw("14.9%"), now).is_none());
    }

    #[test]
    fn heartbeat_emits_after_long_stall() {
        let mut throttle = ProgressThrottle::new();
        let id = TaskId::new(1);
        let start = Instant::now();

        assert!(throttle.observe(id, &raw("10%"), start).is_some());
        // Still stalled at 11%, but 1.2s have passed
        let later = start + Duration::from_millis(1300);
        assert!(throttle.observe(id, &raw("11%"), later).is_some());
    }

    #[test]
    fn percent_less_events_rate_limited_to_800ms() {
        let mut throttle = ProgressThrottle::new();
        let id = TaskId::new(1);
        let start = Instant::now();

        assert!(throttle.observe(id, &raw("N/A"), start).is_some());
        assert!(
            throttle
                .observe(id, &raw("N/A"), start + Duration::from_millis(500))
                .is_none()
        );
        assert!(
            throttle
                .observe(id, &raw("N/A"), start + Duration::from_millis(900))
                .is_some()
        );
    }

    #[test]
    fn first_numeric_percent_emits_even_right_after_textual_event() {
        let mut throttle = ProgressThrottle::new();
        let id = TaskId::new(1);
        let now = Instant::now();

        assert!(throttle.observe(id, &raw("starting"), now).is_some());
        // Immediately after, but this is the first event carrying a percent
        assert!(throttle.observe(id, &raw("0.3%"), now).is_some());
    }

    #[test]
    fn files_are_throttled_independently() {
        let mut throttle = ProgressThrottle::new();
        let id = TaskId::new(1);
        let now = Instant::now();

        let mut audio = raw("10%");
        audio.file_name = "audio.m4a".to_string();

        assert!(throttle.observe(id, &raw("10%"), now).is_some());
        // Same percent, different file: first event for that file
        assert!(throttle.observe(id, &audio, now).is_some());
    }

    #[test]
    fn tasks_are_throttled_independently() {
        let mut throttle = ProgressThrottle::new();
        let now = Instant::now();

        assert!(throttle.observe(TaskId::new(1), &raw("10%"), now).is_some());
        assert!(throttle.observe(TaskId::new(2), &raw("10%"), now).is_some());
    }

    #[test]
    fn forget_task_resets_state() {
        let mut throttle = ProgressThrottle::new();
        let id = TaskId::new(1);
        let now = Instant::now();

        assert!(throttle.observe(id, &raw("10%"), now).is_some());
        assert!(throttle.observe(id, &raw("11%"), now).is_none());

        throttle.forget_task(id);
        // State dropped: next event counts as the file's first again
        assert!(throttle.observe(id, &raw("11%"), now).is_some());
    }

    #[test]
    fn emitted_event_carries_stripped_speed_and_eta() {
        let mut throttle = ProgressThrottle::new();
        let mut raw_event = raw("50%");
        raw_event.speed_text = "\x1b[0;32m1.2MiB/s\x1b[0m".to_string();
        raw_event.eta_text = "\x1b[0;33m00:42\x1b[0m".to_string();

        let event = throttle
            .observe(TaskId::new(1), &raw_event, Instant::now())
            .unwrap();
        assert_eq!(event.speed, "1.2MiB/s");
        assert_eq!(event.eta, "00:42");
        assert_eq!(event.phase, Phase::Downloading);
    }
}
