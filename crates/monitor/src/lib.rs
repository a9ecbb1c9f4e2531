//! Drowsiness Monitor
//!
//! Owns the background sampling loop. `Monitor::start` opens the frame
//! source and spawns the loop thread; `Monitor::stop` raises the shutdown
//! flag and joins it. Everything the loop produces leaves through the
//! shared handles in [`MonitorContext`].

mod config;
mod sampler;
mod settings;

pub use config::MonitorConfig;
pub use settings::{DetectionSettings, SettingsSnapshot, SettingsUpdate};

use affect::{AffectClassifier, AffectCoordinator};
use alerting::{AlertPublisher, DetectionStats, SourceStatus, StatusBoard};
use camera_capture::{CameraError, FrameSource};
use dms::LandmarkExtractor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{error, info, warn};

use sampler::Sampler;

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Frame source failed to open: {0}")]
    Source(#[from] CameraError),

    #[error("Failed to spawn sampling thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Handles shared between the sampling loop and its readers
#[derive(Clone)]
pub struct MonitorContext {
    pub board: Arc<StatusBoard>,
    pub publisher: AlertPublisher,
    pub stats: Arc<DetectionStats>,
    pub settings: Arc<DetectionSettings>,
    pub coordinator: Arc<AffectCoordinator>,
}

/// Running sampling loop
pub struct Monitor {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Open `source` and start sampling on a dedicated thread.
    ///
    /// Fails without retrying when the source cannot be opened; the board
    /// then reports the source as unavailable.
    pub fn start<S, E>(
        mut source: S,
        extractor: E,
        affect: Option<Box<dyn AffectClassifier>>,
        ctx: MonitorContext,
        config: MonitorConfig,
    ) -> Result<Self, MonitorError>
    where
        S: FrameSource + 'static,
        E: LandmarkExtractor + 'static,
    {
        if let Err(e) = source.open() {
            error!(error = %e, "Could not open {}", source.describe());
            ctx.board.update(|r| {
                r.source = SourceStatus::Unavailable;
                r.source_error = Some(e.to_string());
            });
            return Err(e.into());
        }
        info!("Opened {}", source.describe());

        if affect.is_none() && ctx.coordinator.is_enabled() {
            warn!("No affect classifier configured, affect analysis disabled");
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let sampler = Sampler::new(source, extractor, affect, ctx, config);
        let handle = std::thread::Builder::new()
            .name("sampler".into())
            .spawn(move || sampler.run(flag))?;

        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Whether the loop thread is still sampling
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop sampling and wait for the loop to release its resources.
    /// Safe to call more than once.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        info!("Stopping monitor");
        self.shutdown.store(true, Ordering::Release);
        if handle.join().is_err() {
            error!("Sampling thread panicked");
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}
