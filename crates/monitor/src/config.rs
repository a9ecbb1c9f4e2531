//! Sampling loop configuration

use std::time::Duration;

/// Sampling loop configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Frames discarded after open while exposure settles
    pub warmup_frames: u32,
    /// Pause after a failed read or classification
    pub read_backoff: Duration,
    /// Pause after every iteration (caps the loop near 30 Hz)
    pub throttle: Duration,
    /// Flip frames horizontally before classification
    pub mirror: bool,
    /// How long shutdown waits for an in-flight affect analysis
    pub affect_grace: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            warmup_frames: 10,
            read_backoff: Duration::from_millis(100),
            throttle: Duration::from_millis(30),
            mirror: true,
            affect_grace: Duration::from_secs(5),
        }
    }
}
