//! DMS alert events and alert levels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::classifier::FrameClassification;

/// Signal kinds with their own episode tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Both eyes closed for too long
    Drowsiness,

    /// Mouth open wide for too long
    Yawning,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Drowsiness => "drowsiness",
            AlertKind::Yawning => "yawning",
        }
    }

    /// Alert level carried by persisted records of this kind
    pub fn level(&self) -> AlertLevel {
        match self {
            AlertKind::Drowsiness => AlertLevel::Danger,
            AlertKind::Yawning => AlertLevel::Warning,
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sustained episode that crossed its duration threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub timestamp: DateTime<Utc>,
    pub ear_avg: f32,
    pub mar: f32,
    /// Elapsed episode time when the alert fired
    pub duration_seconds: f64,
    pub message: String,
}

impl AlertEvent {
    pub fn new(
        kind: AlertKind,
        classification: &FrameClassification,
        elapsed: Duration,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let duration_seconds = round_to(elapsed.as_secs_f64(), 1);
        let message = match kind {
            AlertKind::Drowsiness => {
                format!("DROWSINESS DETECTED! Eyes closed for {:.1}s", duration_seconds)
            }
            AlertKind::Yawning => {
                format!("YAWNING DETECTED! Mouth open for {:.1}s", duration_seconds)
            }
        };
        Self {
            kind,
            timestamp,
            ear_avg: classification.ear_avg,
            mar: classification.mar,
            duration_seconds,
            message,
        }
    }
}

/// Instantaneous alert level derived from one classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// No frame processed yet
    #[default]
    Unknown,
    NoFace,
    Danger,
    Warning,
    Safe,
}

impl AlertLevel {
    /// Priority: no face > eyes closed > yawning > safe
    pub fn from_classification(classification: &FrameClassification) -> Self {
        if !classification.face_present {
            AlertLevel::NoFace
        } else if classification.eyes_closed {
            AlertLevel::Danger
        } else if classification.yawning {
            AlertLevel::Warning
        } else {
            AlertLevel::Safe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Unknown => "unknown",
            AlertLevel::NoFace => "no_face",
            AlertLevel::Danger => "danger",
            AlertLevel::Warning => "warning",
            AlertLevel::Safe => "safe",
        }
    }

    /// Operator-facing status line
    pub fn message(&self) -> &'static str {
        match self {
            AlertLevel::Unknown => "Waiting for detection...",
            AlertLevel::NoFace => "No face detected",
            AlertLevel::Danger => "DROWSINESS DETECTED! Both eyes closed!",
            AlertLevel::Warning => "Yawning detected",
            AlertLevel::Safe => "All good - Driver is alert",
        }
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
