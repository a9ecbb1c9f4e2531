//! Live detection settings

use dms::{validate_alert_duration, validate_eye, validate_mouth, AlertDurations, Thresholds, ValidationError};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// Thresholds and durations applied by the next sampling iteration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SettingsSnapshot {
    pub thresholds: Thresholds,
    pub durations: AlertDurations,
}

/// Partial update; absent fields keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub ear_threshold: Option<f32>,
    pub mar_threshold: Option<f32>,
    /// Drowsiness duration in seconds
    pub alert_duration: Option<f64>,
}

/// Shared settings slot. Updates are validated as a whole and either
/// replace the snapshot or leave it untouched.
#[derive(Debug)]
pub struct DetectionSettings {
    tx: watch::Sender<SettingsSnapshot>,
}

impl DetectionSettings {
    pub fn new(initial: SettingsSnapshot) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> SettingsSnapshot {
        *self.tx.borrow()
    }

    /// Validate every field, then merge the present ones into the live
    /// snapshot under the channel lock.
    pub fn update(&self, update: &SettingsUpdate) -> Result<SettingsSnapshot, ValidationError> {
        let eye = update.ear_threshold.map(validate_eye).transpose()?;
        let mouth = update.mar_threshold.map(validate_mouth).transpose()?;
        let drowsiness = update.alert_duration.map(validate_alert_duration).transpose()?;

        let mut next = SettingsSnapshot::default();
        self.tx.send_modify(|current| {
            if let Some(eye) = eye {
                current.thresholds.eye = eye;
            }
            if let Some(mouth) = mouth {
                current.thresholds.mouth = mouth;
            }
            if let Some(drowsiness) = drowsiness {
                current.durations.drowsiness = drowsiness;
            }
            next = *current;
        });

        info!(
            eye = next.thresholds.eye,
            mouth = next.thresholds.mouth,
            drowsiness_secs = next.durations.drowsiness.as_secs_f64(),
            "Detection settings updated"
        );
        Ok(next)
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self::new(SettingsSnapshot::default())
    }
}
