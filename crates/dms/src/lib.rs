//! Driver Monitoring System (DMS)
//!
//! Per-frame driver state analysis from facial landmarks:
//! - Eye aspect ratio (EAR) and mouth aspect ratio (MAR)
//! - Eyes-closed and yawning classification against live thresholds
//! - Duration-based hysteresis turning sustained episodes into alerts
//! - Face-mesh landmark extraction with an ONNX model

pub mod analysis;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod landmarks;
pub mod ratio;
pub mod state;

pub use analysis::{AlertEvent, AlertKind, AlertLevel};
pub use classifier::{FrameClassification, FrameClassifier};
pub use config::{
    validate_alert_duration, validate_eye, validate_mouth, AlertDurations, DmsConfig, Thresholds,
    ValidationError,
};
pub use detector::FaceMeshDetector;
pub use landmarks::{FaceLandmarks, LandmarkExtractor, Point};
pub use ratio::{eye_aspect_ratio, mouth_aspect_ratio};
pub use state::{DriverState, EpisodePhase, EpisodeTracker};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}
