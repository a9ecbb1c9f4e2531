//! Affect Classification
//!
//! Low-frequency emotion estimation from the driver camera:
//! - Classifier contract and label folding to `{happy, sad, neutral}`
//! - Coordinator enforcing the cadence and a single in-flight analysis
//! - ONNX (FER+) emotion model

mod coordinator;
mod onnx;
mod scores;

pub use coordinator::{AffectCoordinator, AffectReading, AffectState};
pub use onnx::OnnxEmotionClassifier;
pub use scores::AffectScores;

use camera_capture::VideoFrame;
use std::collections::HashMap;
use thiserror::Error;

/// Affect error types
#[derive(Error, Debug)]
pub enum AffectError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Classification failed: {0}")]
    Classification(String),
}

/// Maps a face image to per-label scores (percent).
///
/// Runs far slower than the frame rate; callers never invoke it from the
/// sampling loop directly.
pub trait AffectClassifier: Send {
    fn classify(&mut self, frame: &VideoFrame) -> Result<HashMap<String, f32>, AffectError>;
}

impl AffectClassifier for Box<dyn AffectClassifier> {
    fn classify(&mut self, frame: &VideoFrame) -> Result<HashMap<String, f32>, AffectError> {
        (**self).classify(frame)
    }
}
