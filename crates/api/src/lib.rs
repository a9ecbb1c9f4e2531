//! Drowsiness Monitor API Server
//!
//! REST API and WebSocket server over the monitor's read model: status
//! queries, live settings, alert history and a push channel for alerts.

pub mod config;
pub mod error;
pub mod logging;
mod routes;
mod ws;

use affect::AffectCoordinator;
use alerting::{AlertPublisher, DetectionStats, StatusBoard};
use axum::{
    routing::{get, post},
    Router,
};
use dms::LandmarkExtractor;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use monitor::{DetectionSettings, MonitorContext};
use std::sync::{Arc, Mutex};
use storage::Repository;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use logging::init_logging;

/// Extractor reserved for uploaded frames; never the sampling loop's
pub type SharedExtractor = Arc<Mutex<Box<dyn LandmarkExtractor>>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub board: Arc<StatusBoard>,
    pub publisher: AlertPublisher,
    pub stats: Arc<DetectionStats>,
    pub settings: Arc<DetectionSettings>,
    pub coordinator: Arc<AffectCoordinator>,
    /// Alert history; `None` when persistence is disabled
    pub repository: Option<Repository>,
    pub frame_detector: Option<SharedExtractor>,
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
}

impl AppState {
    pub fn new(ctx: MonitorContext) -> Self {
        Self {
            board: ctx.board,
            publisher: ctx.publisher,
            stats: ctx.stats,
            settings: ctx.settings,
            coordinator: ctx.coordinator,
            repository: None,
            frame_detector: None,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_frame_detector(mut self, detector: Box<dyn LandmarkExtractor>) -> Self {
        self.frame_detector = Some(Arc::new(Mutex::new(detector)));
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Install the global Prometheus recorder
pub fn install_metrics() -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::get_health))
        .route("/api/v1/detect/current", get(routes::detect::get_current))
        .route("/api/v1/detect/combined", get(routes::detect::get_combined))
        .route("/api/v1/detect/frame", post(routes::detect::post_frame))
        .route("/api/v1/emotions/current", get(routes::emotions::get_current))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route("/api/v1/settings", post(routes::settings::post_settings))
        .route("/api/v1/alerts", get(routes::alerts::get_alerts))
        .route("/ws/alerts", get(ws::ws_alerts))
        .route("/metrics", get(routes::metrics::get_metrics))
        .with_state(state)
}
