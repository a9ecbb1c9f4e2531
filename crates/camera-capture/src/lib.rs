//! Camera Capture Library for the Drowsiness Monitor
//!
//! Provides the frame source contract consumed by the sampling loop.
//! Supports:
//! - Decoded RGB video frames with mirroring for selfie-style cameras
//! - Still-image sequences replayed at a fixed rate (bench rigs, replays)

pub mod frame;
pub mod sequence;

pub use frame::VideoFrame;
pub use sequence::ImageSequenceSource;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    /// The source cannot be opened at all (device gone, bad path).
    #[error("Camera unavailable: {0}")]
    Unavailable(String),

    /// A single frame could not be delivered; the next read may succeed.
    #[error("Frame read timed out")]
    Timeout,

    #[error("Frame decode failed: {0}")]
    Decode(String),

    /// The source reached the end of a finite stream.
    #[error("Frame source closed")]
    Closed,

    #[error("Camera not opened")]
    NotOpened,
}

impl CameraError {
    /// Whether the sampling loop should retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, CameraError::Timeout | CameraError::Decode(_))
    }
}

/// A lazy, effectively infinite sequence of frames.
///
/// The sampling loop owns its source exclusively: `open` is called once at
/// start, `read` once per iteration and `close` exactly once on exit.
pub trait FrameSource: Send {
    /// Acquire the underlying device.
    fn open(&mut self) -> Result<(), CameraError>;

    /// Block until the next frame is available.
    fn read(&mut self) -> Result<VideoFrame, CameraError>;

    /// Release the underlying device.
    fn close(&mut self);

    /// Human readable description for status reporting.
    fn describe(&self) -> String {
        "camera".to_string()
    }
}

impl FrameSource for Box<dyn FrameSource> {
    fn open(&mut self) -> Result<(), CameraError> {
        (**self).open()
    }

    fn read(&mut self) -> Result<VideoFrame, CameraError> {
        (**self).read()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Camera configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Directory holding the frames to replay
    pub source: PathBuf,
    /// Target FPS
    pub fps: u32,
    /// Restart from the first frame when the sequence ends
    pub looping: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("frames"),
            fps: 30,
            looping: true,
        }
    }
}

impl CameraConfig {
    /// Interval between two frames at the configured rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.fps.max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CameraError::Timeout.is_transient());
        assert!(CameraError::Decode("bad jpeg".into()).is_transient());
        assert!(!CameraError::Closed.is_transient());
        assert!(!CameraError::Unavailable("/dev/video0".into()).is_transient());
    }

    #[test]
    fn test_frame_interval() {
        let config = CameraConfig {
            fps: 20,
            ..Default::default()
        };
        assert_eq!(config.frame_interval(), Duration::from_millis(50));

        let zero = CameraConfig {
            fps: 0,
            ..Default::default()
        };
        assert_eq!(zero.frame_interval(), Duration::from_secs(1));
    }
}
