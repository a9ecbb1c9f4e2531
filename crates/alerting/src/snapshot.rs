//! Latest detection result shared with status readers
//!
//! The sampling loop is the only writer. Every publish swaps in a complete
//! new [`LatestResult`]; readers clone an `Arc` and never observe a
//! half-updated value.

use affect::AffectScores;
use chrono::{DateTime, Utc};
use dms::{AlertKind, AlertLevel, DriverState, FrameClassification, Thresholds};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Frame source state as seen by status readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    #[default]
    Starting,
    Running,
    Unavailable,
    Ended,
    Stopped,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Starting => "starting",
            SourceStatus::Running => "running",
            SourceStatus::Unavailable => "unavailable",
            SourceStatus::Ended => "ended",
            SourceStatus::Stopped => "stopped",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SourceStatus::Running)
    }
}

/// Episode timing copied out of one tracker
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EpisodeSnapshot {
    pub started_at: Option<Instant>,
    pub min_duration: Duration,
}

impl EpisodeSnapshot {
    /// Elapsed seconds and percent of the minimum duration, both rounded to
    /// one decimal. Progress is clamped to `[0, 100]`.
    pub fn progress(&self, now: Instant) -> SignalProgress {
        let Some(started_at) = self.started_at else {
            return SignalProgress::default();
        };
        let elapsed = now.saturating_duration_since(started_at).as_secs_f64();
        let min = self.min_duration.as_secs_f64();
        let percent = if min > 0.0 {
            (elapsed / min * 100.0).clamp(0.0, 100.0)
        } else {
            100.0
        };
        SignalProgress {
            duration: round1(elapsed),
            progress: round1(percent),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SignalProgress {
    /// Seconds since the episode started
    pub duration: f64,
    /// Percent of the configured minimum duration
    pub progress: f64,
}

/// One sampling iteration's outcome
#[derive(Debug, Clone)]
pub struct LatestResult {
    pub timestamp: DateTime<Utc>,
    pub classification: FrameClassification,
    pub alert_level: AlertLevel,
    pub message: String,
    pub affect_label: Option<String>,
    pub affect_scores: AffectScores,
    pub drowsiness: EpisodeSnapshot,
    pub yawning: EpisodeSnapshot,
    pub thresholds: Thresholds,
    pub fps: f32,
    pub source: SourceStatus,
    pub source_error: Option<String>,
    pub frames_processed: u64,
}

impl Default for LatestResult {
    fn default() -> Self {
        Self::waiting()
    }
}

impl LatestResult {
    /// Placeholder published before the first frame
    pub fn waiting() -> Self {
        Self {
            timestamp: Utc::now(),
            classification: FrameClassification::default(),
            alert_level: AlertLevel::Unknown,
            message: AlertLevel::Unknown.message().to_string(),
            affect_label: None,
            affect_scores: AffectScores::default(),
            drowsiness: EpisodeSnapshot::default(),
            yawning: EpisodeSnapshot::default(),
            thresholds: Thresholds::default(),
            fps: 0.0,
            source: SourceStatus::Starting,
            source_error: None,
            frames_processed: 0,
        }
    }

    /// Copy the classification and both episode trackers into the result
    pub fn record_frame(
        &mut self,
        classification: FrameClassification,
        state: &DriverState,
        thresholds: Thresholds,
        timestamp: DateTime<Utc>,
    ) {
        let level = AlertLevel::from_classification(&classification);
        self.timestamp = timestamp;
        self.classification = classification;
        self.alert_level = level;
        self.message = level.message().to_string();
        self.thresholds = thresholds;
        self.drowsiness = episode(state, AlertKind::Drowsiness);
        self.yawning = episode(state, AlertKind::Yawning);
        self.frames_processed += 1;
    }

    /// Derived view for status queries
    pub fn view(&self, now: Instant) -> StatusView {
        let c = &self.classification;
        StatusView {
            timestamp: self.timestamp,
            face_detected: c.face_present,
            ear_left: round3(c.ear_left),
            ear_right: round3(c.ear_right),
            ear: round3(c.ear_avg),
            mar: round3(c.mar),
            is_drowsy: c.eyes_closed,
            is_yawning: c.yawning,
            alert_level: self.alert_level,
            message: self.message.clone(),
            eye_threshold: self.thresholds.eye,
            mouth_threshold: self.thresholds.mouth,
            drowsiness: self.drowsiness.progress(now),
            yawning: self.yawning.progress(now),
            emotion: self.affect_label.clone(),
            emotion_scores: self.affect_scores,
            fps: self.fps,
            camera: self.source,
        }
    }
}

fn episode(state: &DriverState, kind: AlertKind) -> EpisodeSnapshot {
    let tracker = state.tracker(kind);
    EpisodeSnapshot {
        started_at: tracker.started_at(),
        min_duration: tracker.min_duration(),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

/// Serializable status query response
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub timestamp: DateTime<Utc>,
    pub face_detected: bool,
    pub ear_left: f32,
    pub ear_right: f32,
    pub ear: f32,
    pub mar: f32,
    pub is_drowsy: bool,
    pub is_yawning: bool,
    pub alert_level: AlertLevel,
    pub message: String,
    pub eye_threshold: f32,
    pub mouth_threshold: f32,
    pub drowsiness: SignalProgress,
    pub yawning: SignalProgress,
    pub emotion: Option<String>,
    pub emotion_scores: AffectScores,
    pub fps: f32,
    pub camera: SourceStatus,
}

/// Single-writer, many-reader slot holding the latest result
#[derive(Debug)]
pub struct StatusBoard {
    tx: watch::Sender<Arc<LatestResult>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(LatestResult::waiting()));
        Self { tx }
    }

    /// Replace the whole result
    pub fn publish(&self, result: LatestResult) {
        self.tx.send_replace(Arc::new(result));
    }

    /// Copy the current result, apply `f` and publish the copy
    pub fn update(&self, f: impl FnOnce(&mut LatestResult)) {
        let mut next = (*self.latest()).clone();
        f(&mut next);
        self.publish(next);
    }

    /// Point-in-time snapshot
    pub fn latest(&self) -> Arc<LatestResult> {
        self.tx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::AlertDurations;

    fn closed_and_yawning() -> FrameClassification {
        FrameClassification::from_ratios(0.1, 0.1, 0.9, &Thresholds::default())
    }

    #[test]
    fn test_waiting_placeholder() {
        let board = StatusBoard::new();
        let latest = board.latest();
        assert_eq!(latest.alert_level, AlertLevel::Unknown);
        assert_eq!(latest.message, "Waiting for detection...");
        assert_eq!(latest.source, SourceStatus::Starting);
    }

    #[test]
    fn test_eyes_closed_outranks_yawning() {
        let mut result = LatestResult::waiting();
        let state = DriverState::default();
        result.record_frame(closed_and_yawning(), &state, Thresholds::default(), Utc::now());

        let view = result.view(Instant::now());
        assert!(view.is_drowsy && view.is_yawning);
        assert_eq!(view.alert_level, AlertLevel::Danger);
    }

    #[test]
    fn test_progress_is_clamped() {
        let base = Instant::now();
        let snapshot = EpisodeSnapshot {
            started_at: Some(base),
            min_duration: Duration::from_secs(2),
        };

        let half = snapshot.progress(base + Duration::from_secs(1));
        assert_eq!(half.duration, 1.0);
        assert_eq!(half.progress, 50.0);

        let over = snapshot.progress(base + Duration::from_secs(7));
        assert_eq!(over.duration, 7.0);
        assert_eq!(over.progress, 100.0);

        assert_eq!(
            EpisodeSnapshot::default().progress(base),
            SignalProgress::default()
        );
    }

    #[test]
    fn test_record_frame_copies_episode_state() {
        let base = Instant::now();
        let mut state = DriverState::new(AlertDurations::default());
        let classification = closed_and_yawning();
        state.update(&classification, base, Utc::now());

        let mut result = LatestResult::waiting();
        result.record_frame(classification, &state, Thresholds::default(), Utc::now());

        assert_eq!(result.drowsiness.started_at, Some(base));
        assert_eq!(result.drowsiness.min_duration, Duration::from_secs(2));
        assert_eq!(result.yawning.min_duration, Duration::from_secs(1));
        assert_eq!(result.frames_processed, 1);
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let board = StatusBoard::new();
        let before = board.latest();

        board.update(|r| {
            r.fps = 29.5;
            r.source = SourceStatus::Running;
        });

        assert_eq!(before.fps, 0.0);
        assert_eq!(before.source, SourceStatus::Starting);
        let after = board.latest();
        assert_eq!(after.fps, 29.5);
        assert!(after.source.is_running());
    }
}
