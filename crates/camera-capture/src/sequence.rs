//! Still-image sequence replayed as a live camera

use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::{CameraConfig, CameraError, FrameSource, VideoFrame};

const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Replays the images of a directory in file-name order
pub struct ImageSequenceSource {
    config: CameraConfig,
    files: Vec<PathBuf>,
    cursor: usize,
    sequence: u32,
    next_due: Option<Instant>,
    opened: bool,
}

impl ImageSequenceSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            files: Vec::new(),
            cursor: 0,
            sequence: 0,
            next_due: None,
            opened: false,
        }
    }

    /// Number of frames discovered at open
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn pace(&mut self) {
        let interval = self.config.frame_interval();
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.next_due = Some(Instant::now() + interval);
    }

    fn now_ns() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<(), CameraError> {
        let entries = std::fs::read_dir(&self.config.source).map_err(|e| {
            CameraError::Unavailable(format!("{}: {}", self.config.source.display(), e))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CameraError::Unavailable(format!(
                "{}: no frames found",
                self.config.source.display()
            )));
        }

        info!(
            "Opened image sequence {} ({} frames @ {} fps)",
            self.config.source.display(),
            files.len(),
            self.config.fps
        );
        self.files = files;
        self.cursor = 0;
        self.next_due = None;
        self.opened = true;
        Ok(())
    }

    fn read(&mut self) -> Result<VideoFrame, CameraError> {
        if !self.opened {
            return Err(CameraError::NotOpened);
        }

        if self.cursor >= self.files.len() {
            if !self.config.looping {
                return Err(CameraError::Closed);
            }
            debug!("Image sequence wrapped around");
            self.cursor = 0;
        }

        self.pace();

        let path = &self.files[self.cursor];
        self.cursor += 1;

        let rgb = image::open(path)
            .map_err(|e| CameraError::Decode(format!("{}: {}", path.display(), e)))?
            .to_rgb8();

        self.sequence = self.sequence.wrapping_add(1);
        Ok(VideoFrame::from_rgb_image(rgb, Self::now_ns(), self.sequence))
    }

    fn close(&mut self) {
        if self.opened {
            info!("Closed image sequence {}", self.config.source.display());
        }
        self.opened = false;
        self.files.clear();
    }

    fn describe(&self) -> String {
        self.config.source.display().to_string()
    }
}
