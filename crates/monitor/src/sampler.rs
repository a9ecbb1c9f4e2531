//! The sampling loop
//!
//! Runs on its own OS thread and owns the frame source and the landmark
//! extractor. Per iteration: read, mirror, classify, advance the episode
//! trackers, publish the latest result, hand alerts to the publisher and
//! maybe dispatch an affect analysis.

use affect::{AffectClassifier, AffectCoordinator, AffectScores};
use alerting::{EmotionRecord, LatestResult, SinkRecord, SourceStatus};
use camera_capture::{CameraError, FrameSource, VideoFrame};
use chrono::Utc;
use dms::{DriverState, FrameClassifier, LandmarkExtractor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::{MonitorConfig, MonitorContext};

const FPS_WINDOW: Duration = Duration::from_secs(1);
const GRACE_POLL: Duration = Duration::from_millis(10);

/// Frames per second over one-second windows
#[derive(Debug)]
pub(crate) struct FpsMeter {
    window_start: Instant,
    frames: u32,
    fps: f32,
}

impl FpsMeter {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    pub(crate) fn tick(&mut self, now: Instant) -> f32 {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= FPS_WINDOW {
            self.fps = self.frames as f32 / elapsed.as_secs_f32();
            self.frames = 0;
            self.window_start = now;
        }
        self.fps
    }
}

/// Single-slot affect dispatcher
struct AffectWorker {
    classifier: Arc<Mutex<Box<dyn AffectClassifier>>>,
    coordinator: Arc<AffectCoordinator>,
    task: Option<JoinHandle<()>>,
    abandoned: Arc<AtomicBool>,
}

impl AffectWorker {
    fn reap(&mut self) {
        if self.task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.task.take() {
                if task.join().is_err() {
                    error!("Affect analysis thread panicked");
                }
            }
        }
    }

    fn dispatch(&mut self, frame: &VideoFrame, now: Instant, ctx: &MonitorContext) {
        self.reap();
        if self.task.is_some() || !self.coordinator.try_begin(now) {
            return;
        }

        let frame = frame.clone();
        let classifier = Arc::clone(&self.classifier);
        let coordinator = Arc::clone(&self.coordinator);
        let abandoned = Arc::clone(&self.abandoned);
        let publisher = ctx.publisher.clone();

        debug!(sequence = frame.sequence, "Dispatching affect analysis");
        let spawned = std::thread::Builder::new()
            .name("affect".into())
            .spawn(move || {
                let result = classifier
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .classify(&frame);

                if abandoned.load(Ordering::Acquire) {
                    debug!("Affect result discarded after shutdown");
                    coordinator.fail(Instant::now());
                    return;
                }

                match result {
                    Ok(raw) => {
                        let scores = AffectScores::fold(&raw);
                        if let Some(reading) = coordinator.complete(scores, Instant::now(), Utc::now()) {
                            publisher.persist(SinkRecord::Emotion(EmotionRecord::from(&reading)));
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Affect analysis failed");
                        coordinator.fail(Instant::now());
                    }
                }
            });

        match spawned {
            Ok(handle) => self.task = Some(handle),
            Err(e) => {
                error!(error = %e, "Failed to spawn affect analysis");
                self.coordinator.fail(now);
            }
        }
    }

    /// Wait up to `grace` for the in-flight analysis, then let it go
    fn finish(&mut self, grace: Duration) {
        let Some(task) = self.task.take() else {
            return;
        };

        let deadline = Instant::now() + grace;
        while !task.is_finished() && Instant::now() < deadline {
            std::thread::sleep(GRACE_POLL);
        }

        if task.is_finished() {
            if task.join().is_err() {
                error!("Affect analysis thread panicked");
            }
        } else {
            warn!("Affect analysis still running after {:?}, abandoning it", grace);
            self.abandoned.store(true, Ordering::Release);
        }
    }
}

pub(crate) struct Sampler<S, E> {
    source: S,
    classifier: FrameClassifier<E>,
    state: DriverState,
    affect: Option<AffectWorker>,
    ctx: MonitorContext,
    config: MonitorConfig,
}

impl<S: FrameSource, E: LandmarkExtractor> Sampler<S, E> {
    pub(crate) fn new(
        source: S,
        extractor: E,
        affect: Option<Box<dyn AffectClassifier>>,
        ctx: MonitorContext,
        config: MonitorConfig,
    ) -> Self {
        let state = DriverState::new(ctx.settings.current().durations);
        let affect = affect.map(|classifier| AffectWorker {
            classifier: Arc::new(Mutex::new(classifier)),
            coordinator: Arc::clone(&ctx.coordinator),
            task: None,
            abandoned: Arc::new(AtomicBool::new(false)),
        });
        Self {
            source,
            classifier: FrameClassifier::new(extractor),
            state,
            affect,
            ctx,
            config,
        }
    }

    /// Loop until `shutdown` is raised or the source ends, then release
    /// everything the loop owns.
    pub(crate) fn run(mut self, shutdown: Arc<AtomicBool>) {
        info!("Sampling loop started on {}", self.source.describe());
        self.ctx.board.update(|r| r.source = SourceStatus::Running);

        let (status, detail) = self.sample(&shutdown);
        self.finish(status, detail);
    }

    fn warm_up(&mut self, shutdown: &AtomicBool) -> Result<(), CameraError> {
        for _ in 0..self.config.warmup_frames {
            if shutdown.load(Ordering::Acquire) {
                break;
            }
            match self.source.read() {
                Ok(_) => {}
                Err(e) if e.is_transient() => std::thread::sleep(self.config.read_backoff),
                Err(e) => return Err(e),
            }
        }
        debug!("Warm-up complete ({} frames)", self.config.warmup_frames);
        Ok(())
    }

    fn sample(&mut self, shutdown: &AtomicBool) -> (SourceStatus, Option<String>) {
        if let Err(e) = self.warm_up(shutdown) {
            return Self::terminal(e);
        }

        let mut result = (*self.ctx.board.latest()).clone();
        result.source = SourceStatus::Running;
        let mut fps = FpsMeter::new(Instant::now());

        while !shutdown.load(Ordering::Acquire) {
            let mut frame = match self.source.read() {
                Ok(frame) => frame,
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Frame read failed, retrying");
                    metrics::counter!("frame_read_failures_total").increment(1);
                    std::thread::sleep(self.config.read_backoff);
                    continue;
                }
                Err(e) => return Self::terminal(e),
            };
            if self.config.mirror {
                frame.mirror_horizontal();
            }

            let settings = self.ctx.settings.current();
            if settings.durations != self.state.durations() {
                self.state.set_durations(settings.durations);
            }

            let classification = match self.classifier.classify(&frame, &settings.thresholds) {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "Frame classification failed");
                    std::thread::sleep(self.config.read_backoff);
                    continue;
                }
            };

            let now = Instant::now();
            let timestamp = Utc::now();
            let events = self.state.update(&classification, now, timestamp);

            let affect = self.ctx.coordinator.snapshot();
            result.record_frame(classification, &self.state, settings.thresholds, timestamp);
            result.affect_label = affect.label;
            result.affect_scores = affect.scores;
            result.fps = fps.tick(now);
            self.ctx.board.publish(result.clone());
            metrics::counter!("frames_processed_total").increment(1);

            for event in &events {
                self.ctx.publisher.publish(event);
                let record = self.ctx.stats.record_alert(event);
                self.ctx.publisher.persist(SinkRecord::Statistics(record));
            }

            if let Some(worker) = self.affect.as_mut() {
                worker.dispatch(&frame, now, &self.ctx);
            }

            std::thread::sleep(self.config.throttle);
        }

        (SourceStatus::Stopped, None)
    }

    fn terminal(e: CameraError) -> (SourceStatus, Option<String>) {
        match e {
            CameraError::Closed => {
                info!("Frame source reached end of stream");
                (SourceStatus::Ended, None)
            }
            other => {
                error!(error = %other, "Frame source failed, sampling stopped");
                (SourceStatus::Unavailable, Some(other.to_string()))
            }
        }
    }

    fn finish(mut self, status: SourceStatus, detail: Option<String>) {
        info!("Sampling loop stopping ({})", status.as_str());
        if let Some(worker) = self.affect.as_mut() {
            worker.finish(self.config.affect_grace);
        }
        self.source.close();
        self.classifier.release();

        self.ctx.board.update(|r: &mut LatestResult| {
            r.source = status;
            r.source_error = detail;
            r.fps = 0.0;
        });
        info!("Sampling loop stopped");
    }
}
