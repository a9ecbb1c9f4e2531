//! Per-frame eye and mouth classification

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::landmarks::{FaceLandmarks, LandmarkExtractor};
use crate::ratio::{eye_aspect_ratio, mouth_aspect_ratio};
use crate::DmsError;

/// Ratios and booleans for one frame.
///
/// Without a face every ratio is zero and both booleans are false.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameClassification {
    pub face_present: bool,
    pub ear_left: f32,
    pub ear_right: f32,
    pub ear_avg: f32,
    pub mar: f32,
    pub eyes_closed: bool,
    pub yawning: bool,
}

impl FrameClassification {
    /// Classification of a frame without a face
    pub fn no_face() -> Self {
        Self::default()
    }

    /// Apply the thresholds to a set of landmarks.
    ///
    /// Closure needs both eyes under the threshold; the average alone never
    /// counts, so a wink or a single drooping lid does not qualify.
    pub fn from_landmarks(landmarks: &FaceLandmarks, thresholds: &Thresholds) -> Self {
        let ear_left = eye_aspect_ratio(&landmarks.left_eye);
        let ear_right = eye_aspect_ratio(&landmarks.right_eye);
        let mar = mouth_aspect_ratio(&landmarks.mouth);
        Self::from_ratios(ear_left, ear_right, mar, thresholds)
    }

    pub fn from_ratios(ear_left: f32, ear_right: f32, mar: f32, thresholds: &Thresholds) -> Self {
        Self {
            face_present: true,
            ear_left,
            ear_right,
            ear_avg: (ear_left + ear_right) / 2.0,
            mar,
            eyes_closed: ear_left < thresholds.eye && ear_right < thresholds.eye,
            yawning: mar > thresholds.mouth,
        }
    }
}

/// Runs the extractor and applies the thresholds
pub struct FrameClassifier<E> {
    extractor: E,
}

impl<E: LandmarkExtractor> FrameClassifier<E> {
    pub fn new(extractor: E) -> Self {
        Self { extractor }
    }

    /// Classify one frame; thresholds are compared, never validated, here
    pub fn classify(
        &mut self,
        frame: &VideoFrame,
        thresholds: &Thresholds,
    ) -> Result<FrameClassification, DmsError> {
        Ok(match self.extractor.detect(frame)? {
            Some(landmarks) => FrameClassification::from_landmarks(&landmarks, thresholds),
            None => FrameClassification::no_face(),
        })
    }

    /// Release the extractor's model resources
    pub fn release(&mut self) {
        self.extractor.release();
    }
}
