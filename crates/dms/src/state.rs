//! Driver state tracking
//!
//! Each alert kind runs the same three-phase episode machine:
//!
//! ```text
//!   Idle --(condition true)--> Pending --(elapsed >= min)--> Fired
//!     ^                           |                            |
//!     +-----(condition false)-----+----------------------------+
//! ```
//!
//! An episode fires at most once; it re-arms only after the condition clears.
//! Losing the face forces every machine back to `Idle`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::analysis::{AlertEvent, AlertKind};
use crate::classifier::FrameClassification;
use crate::config::AlertDurations;

/// Episode phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodePhase {
    #[default]
    Idle,
    Pending,
    Fired,
}

/// Debounces one boolean signal by wall-clock duration
#[derive(Debug, Clone)]
pub struct EpisodeTracker {
    min_duration: Duration,
    started_at: Option<Instant>,
    fired: bool,
}

impl EpisodeTracker {
    pub fn new(min_duration: Duration) -> Self {
        Self {
            min_duration,
            started_at: None,
            fired: false,
        }
    }

    /// Feed the condition observed at `now`.
    ///
    /// Returns the episode's elapsed time on the single update where it
    /// reaches the minimum duration.
    pub fn update(&mut self, active: bool, now: Instant) -> Option<Duration> {
        if !active {
            self.reset();
            return None;
        }

        let started_at = *self.started_at.get_or_insert(now);
        let elapsed = now.saturating_duration_since(started_at);
        if !self.fired && elapsed >= self.min_duration {
            self.fired = true;
            return Some(elapsed);
        }
        None
    }

    pub fn reset(&mut self) {
        self.started_at = None;
        self.fired = false;
    }

    pub fn phase(&self) -> EpisodePhase {
        match (self.started_at, self.fired) {
            (None, _) => EpisodePhase::Idle,
            (Some(_), false) => EpisodePhase::Pending,
            (Some(_), true) => EpisodePhase::Fired,
        }
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn min_duration(&self) -> Duration {
        self.min_duration
    }

    /// Takes effect for the running episode as well
    pub fn set_min_duration(&mut self, min_duration: Duration) {
        self.min_duration = min_duration;
    }
}

/// Driver state (tracked over time)
#[derive(Debug, Clone)]
pub struct DriverState {
    pub drowsiness: EpisodeTracker,
    pub yawning: EpisodeTracker,
}

impl Default for DriverState {
    fn default() -> Self {
        Self::new(AlertDurations::default())
    }
}

impl DriverState {
    pub fn new(durations: AlertDurations) -> Self {
        Self {
            drowsiness: EpisodeTracker::new(durations.drowsiness),
            yawning: EpisodeTracker::new(durations.yawning),
        }
    }

    /// Advance both machines with one classification.
    ///
    /// Returns zero, one or two events; both kinds are evaluated every frame.
    pub fn update(
        &mut self,
        classification: &FrameClassification,
        now: Instant,
        timestamp: DateTime<Utc>,
    ) -> Vec<AlertEvent> {
        if !classification.face_present {
            self.reset();
            return Vec::new();
        }

        let mut events = Vec::new();
        if let Some(elapsed) = self.drowsiness.update(classification.eyes_closed, now) {
            events.push(AlertEvent::new(
                AlertKind::Drowsiness,
                classification,
                elapsed,
                timestamp,
            ));
        }
        if let Some(elapsed) = self.yawning.update(classification.yawning, now) {
            events.push(AlertEvent::new(
                AlertKind::Yawning,
                classification,
                elapsed,
                timestamp,
            ));
        }
        events
    }

    pub fn set_durations(&mut self, durations: AlertDurations) {
        self.drowsiness.set_min_duration(durations.drowsiness);
        self.yawning.set_min_duration(durations.yawning);
    }

    pub fn durations(&self) -> AlertDurations {
        AlertDurations {
            drowsiness: self.drowsiness.min_duration(),
            yawning: self.yawning.min_duration(),
        }
    }

    pub fn tracker(&self, kind: AlertKind) -> &EpisodeTracker {
        match kind {
            AlertKind::Drowsiness => &self.drowsiness,
            AlertKind::Yawning => &self.yawning,
        }
    }

    /// Reset state (face lost, driver change)
    pub fn reset(&mut self) {
        self.drowsiness.reset();
        self.yawning.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    fn at(base: Instant, secs: f64) -> Instant {
        base + Duration::from_secs_f64(secs)
    }

    fn face(eyes_closed: bool, yawning: bool) -> FrameClassification {
        FrameClassification {
            face_present: true,
            ear_left: if eyes_closed { 0.1 } else { 0.3 },
            ear_right: if eyes_closed { 0.1 } else { 0.3 },
            ear_avg: if eyes_closed { 0.1 } else { 0.3 },
            mar: if yawning { 0.8 } else { 0.3 },
            eyes_closed,
            yawning,
        }
    }

    #[test]
    fn test_released_one_tick_early_never_fires() {
        let base = Instant::now();
        let mut tracker = EpisodeTracker::new(Duration::from_secs(2));

        let mut t = base;
        while t < base + Duration::from_secs(2) - TICK {
            assert_eq!(tracker.update(true, t), None);
            t += TICK;
        }
        assert_eq!(tracker.update(true, base + Duration::from_secs(2) - TICK), None);
        assert_eq!(tracker.update(false, base + Duration::from_secs(2)), None);
        assert_eq!(tracker.phase(), EpisodePhase::Idle);
    }

    #[test]
    fn test_fires_once_per_episode() {
        let base = Instant::now();
        let mut tracker = EpisodeTracker::new(Duration::from_secs(2));

        assert_eq!(tracker.update(true, base), None);
        assert_eq!(tracker.phase(), EpisodePhase::Pending);

        let fired = tracker.update(true, at(base, 2.001));
        assert!(fired.is_some());
        assert_eq!(tracker.phase(), EpisodePhase::Fired);

        // Holding the condition keeps the episode silent
        for i in 1..100 {
            assert_eq!(tracker.update(true, at(base, 2.0 + i as f64 * 0.1)), None);
        }

        // Clearing re-arms; a fresh episode must run the full duration again
        assert_eq!(tracker.update(false, at(base, 20.0)), None);
        assert_eq!(tracker.update(true, at(base, 21.0)), None);
        assert_eq!(tracker.update(true, at(base, 22.5)), None);
        assert!(tracker.update(true, at(base, 23.0)).is_some());
    }

    #[test]
    fn test_exact_threshold_counts() {
        let base = Instant::now();
        let mut tracker = EpisodeTracker::new(Duration::from_secs(1));
        tracker.update(true, base);
        assert_eq!(
            tracker.update(true, base + Duration::from_secs(1)),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_face_loss_resets_fired_episode() {
        let base = Instant::now();
        let mut state = DriverState::default();

        state.update(&face(true, false), base, Utc::now());
        let events = state.update(&face(true, false), at(base, 2.0), Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(state.drowsiness.phase(), EpisodePhase::Fired);

        state.update(&FrameClassification::no_face(), at(base, 2.1), Utc::now());
        assert_eq!(state.drowsiness.phase(), EpisodePhase::Idle);
        assert_eq!(state.yawning.phase(), EpisodePhase::Idle);

        // Reasserted closure needs the whole duration again
        assert!(state.update(&face(true, false), at(base, 2.2), Utc::now()).is_empty());
        assert!(state.update(&face(true, false), at(base, 4.1), Utc::now()).is_empty());
        let events = state.update(&face(true, false), at(base, 4.3), Utc::now());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_scripted_drowsiness_episode() {
        let base = Instant::now();
        let mut state = DriverState::default();
        let mut fired = Vec::new();

        for t in [0.0, 0.5, 1.0, 1.5, 2.0, 2.5] {
            for event in state.update(&face(true, false), at(base, t), Utc::now()) {
                fired.push((t, event));
            }
        }

        assert_eq!(fired.len(), 1);
        let (t, event) = &fired[0];
        assert_eq!(*t, 2.0);
        assert_eq!(event.kind, AlertKind::Drowsiness);
        assert!((event.duration_seconds - 2.0).abs() < 0.05);
    }

    #[test]
    fn test_both_kinds_can_fire_in_one_frame() {
        let base = Instant::now();
        let mut state = DriverState::new(AlertDurations {
            drowsiness: Duration::from_secs(1),
            yawning: Duration::from_secs(1),
        });

        state.update(&face(true, true), base, Utc::now());
        let events = state.update(&face(true, true), at(base, 1.0), Utc::now());
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![AlertKind::Drowsiness, AlertKind::Yawning]);
    }

    #[test]
    fn test_kinds_are_independent() {
        let base = Instant::now();
        let mut state = DriverState::default();

        state.update(&face(false, true), base, Utc::now());
        let events = state.update(&face(false, true), at(base, 1.0), Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertKind::Yawning);
        assert_eq!(state.drowsiness.phase(), EpisodePhase::Idle);

        // Yawn ends while eyes close: only drowsiness starts pending
        state.update(&face(true, false), at(base, 1.5), Utc::now());
        assert_eq!(state.yawning.phase(), EpisodePhase::Idle);
        assert_eq!(state.drowsiness.phase(), EpisodePhase::Pending);
    }

    #[test]
    fn test_shortened_duration_applies_to_running_episode() {
        let base = Instant::now();
        let mut state = DriverState::default();
        state.update(&face(true, false), base, Utc::now());
        state.set_durations(AlertDurations {
            drowsiness: Duration::from_millis(500),
            yawning: Duration::from_secs(1),
        });
        let events = state.update(&face(true, false), at(base, 0.6), Utc::now());
        assert_eq!(events.len(), 1);
    }
}
