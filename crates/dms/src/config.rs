//! DMS configuration

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;
use thiserror::Error;

/// Accepted eye threshold range for live updates
pub const EYE_THRESHOLD_RANGE: RangeInclusive<f32> = 0.1..=0.4;
/// Accepted mouth threshold range for live updates
pub const MOUTH_THRESHOLD_RANGE: RangeInclusive<f32> = 0.3..=1.0;
/// Accepted drowsiness duration range (seconds) for live updates
pub const ALERT_DURATION_RANGE: RangeInclusive<f64> = 0.5..=5.0;

/// Rejected threshold or duration update
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("EAR threshold must be between 0.1 and 0.4 (got {0})")]
    EyeThreshold(f32),

    #[error("MAR threshold must be between 0.3 and 1.0 (got {0})")]
    MouthThreshold(f32),

    #[error("Alert duration must be between 0.5 and 5.0 seconds (got {0})")]
    AlertDuration(f64),
}

/// Ratio thresholds applied to every frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Both eyes below this EAR count as closed
    pub eye: f32,
    /// MAR above this counts as a yawn
    pub mouth: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            eye: 0.25,
            mouth: 0.5,
        }
    }
}

impl Thresholds {
    /// Build thresholds, rejecting values outside the documented ranges
    pub fn new(eye: f32, mouth: f32) -> Result<Self, ValidationError> {
        Ok(Self {
            eye: validate_eye(eye)?,
            mouth: validate_mouth(mouth)?,
        })
    }
}

pub fn validate_eye(value: f32) -> Result<f32, ValidationError> {
    if EYE_THRESHOLD_RANGE.contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::EyeThreshold(value))
    }
}

pub fn validate_mouth(value: f32) -> Result<f32, ValidationError> {
    if MOUTH_THRESHOLD_RANGE.contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::MouthThreshold(value))
    }
}

pub fn validate_alert_duration(seconds: f64) -> Result<Duration, ValidationError> {
    if ALERT_DURATION_RANGE.contains(&seconds) {
        Ok(Duration::from_secs_f64(seconds))
    } else {
        Err(ValidationError::AlertDuration(seconds))
    }
}

/// Minimum sustained duration per alert kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertDurations {
    pub drowsiness: Duration,
    pub yawning: Duration,
}

impl Default for AlertDurations {
    fn default() -> Self {
        Self {
            drowsiness: Duration::from_secs(2),
            yawning: Duration::from_secs(1),
        }
    }
}

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmsConfig {
    pub thresholds: Thresholds,
    pub durations: AlertDurations,

    /// Face presence score needed to report landmarks
    pub face_confidence: f32,

    /// Face-mesh model path
    pub landmark_model_path: Option<String>,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            durations: AlertDurations::default(),
            face_confidence: 0.5,
            landmark_model_path: None,
        }
    }
}
