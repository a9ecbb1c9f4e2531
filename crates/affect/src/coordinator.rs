//! Cadence and single in-flight guard for affect analysis

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::scores::AffectScores;

/// Latest affect result plus the scheduling fields
#[derive(Debug, Clone, Default, Serialize)]
pub struct AffectState {
    pub label: Option<String>,
    pub scores: AffectScores,
    pub is_analyzing: bool,
    #[serde(skip)]
    pub last_analysis: Option<Instant>,
    pub last_result_at: Option<DateTime<Utc>>,
}

/// A completed analysis whose dominant label differs from the previous one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffectReading {
    pub label: String,
    pub scores: AffectScores,
    pub timestamp: DateTime<Utc>,
}

/// Owns [`AffectState`]; every mutation goes through its methods.
///
/// The lock is only held to copy or replace a handful of fields, never
/// across a classification.
#[derive(Debug)]
pub struct AffectCoordinator {
    interval: Duration,
    enabled: bool,
    state: Mutex<AffectState>,
}

impl AffectCoordinator {
    pub fn new(interval: Duration) -> Self {
        info!("Affect analysis every {:?}", interval);
        Self {
            interval,
            enabled: true,
            state: Mutex::new(AffectState::default()),
        }
    }

    /// Coordinator that never schedules an analysis
    pub fn disabled() -> Self {
        Self {
            interval: Duration::MAX,
            enabled: false,
            state: Mutex::new(AffectState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AffectState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn due(&self, state: &AffectState, now: Instant) -> bool {
        self.enabled
            && !state.is_analyzing
            && state
                .last_analysis
                .map_or(true, |last| now.saturating_duration_since(last) >= self.interval)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a new analysis would be accepted at `now`
    pub fn should_analyze(&self, now: Instant) -> bool {
        let state = self.lock();
        self.due(&state, now)
    }

    /// Claim the single analysis slot. Returns `false` (and changes nothing)
    /// while an analysis is in flight or before the interval has elapsed.
    pub fn try_begin(&self, now: Instant) -> bool {
        let mut state = self.lock();
        if !self.due(&state, now) {
            return false;
        }
        state.is_analyzing = true;
        debug!("Affect analysis slot claimed");
        true
    }

    /// Record a finished analysis and release the slot.
    ///
    /// Returns a reading when the dominant label changed.
    pub fn complete(
        &self,
        scores: AffectScores,
        now: Instant,
        timestamp: DateTime<Utc>,
    ) -> Option<AffectReading> {
        let label = scores.dominant().to_string();
        let mut state = self.lock();
        let changed = state.label.as_deref() != Some(label.as_str());

        state.label = Some(label.clone());
        state.scores = scores;
        state.is_analyzing = false;
        state.last_analysis = Some(now);
        state.last_result_at = Some(timestamp);
        drop(state);

        info!(
            "Emotion: {} (happy {:.1}% | sad {:.1}% | neutral {:.1}%)",
            label, scores.happy, scores.sad, scores.neutral
        );

        changed.then_some(AffectReading {
            label,
            scores,
            timestamp,
        })
    }

    /// Release the slot after a failed analysis, keeping the previous result
    pub fn fail(&self, now: Instant) {
        let mut state = self.lock();
        state.is_analyzing = false;
        state.last_analysis = Some(now);
    }

    /// Point-in-time copy
    pub fn snapshot(&self) -> AffectState {
        self.lock().clone()
    }

    /// Time left before the next analysis may start
    pub fn time_until_next(&self, now: Instant) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        let state = self.lock();
        state.last_analysis.map_or(Duration::ZERO, |last| {
            self.interval
                .saturating_sub(now.saturating_duration_since(last))
        })
    }
}
