//! Facial landmark types and the extractor contract

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};

use crate::DmsError;

/// 2-D point in frame pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Landmark subsets used for the ratios of a single face.
///
/// Eye points are ordered `p0..p5` with `p0`/`p3` the horizontal corners and
/// (`p1`,`p5`), (`p2`,`p4`) the vertical pairs. Mouth points are ordered with
/// `p0`/`p6` the corners and (`p2`,`p10`), (`p3`,`p9`), (`p4`,`p8`), (`p5`,`p7`)
/// the inner vertical pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceLandmarks {
    pub right_eye: [Point; 6],
    pub left_eye: [Point; 6],
    pub mouth: [Point; 13],
}

/// Produces the landmarks of the primary face in a frame.
///
/// Implementations see only one face; when several are visible the first
/// one reported by the underlying model wins.
pub trait LandmarkExtractor: Send {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError>;

    /// Release model resources. Called once when the owner shuts down.
    fn release(&mut self) {}
}

impl LandmarkExtractor for Box<dyn LandmarkExtractor> {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError> {
        (**self).detect(frame)
    }

    fn release(&mut self) {
        (**self).release()
    }
}
