//! Health Route

use alerting::SourceStatus;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
    pub camera: CameraHealth,
    pub affect_enabled: bool,
    pub persistence: bool,
    pub live_subscribers: usize,
}

#[derive(Debug, Serialize)]
pub struct CameraHealth {
    pub status: SourceStatus,
    pub error: Option<String>,
    pub fps: f32,
    pub frames_processed: u64,
}

/// Always answers; a dead camera degrades the status instead of failing
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let latest = state.board.latest();
    let status = match latest.source {
        SourceStatus::Running | SourceStatus::Starting => "healthy",
        _ => "degraded",
    };

    Json(HealthResponse {
        status,
        timestamp: Utc::now(),
        version: state.version.clone(),
        uptime_seconds: state.stats.uptime_seconds() as u64,
        camera: CameraHealth {
            status: latest.source,
            error: latest.source_error.clone(),
            fps: latest.fps,
            frames_processed: latest.frames_processed,
        },
        affect_enabled: state.coordinator.is_enabled(),
        persistence: state.repository.is_some(),
        live_subscribers: state.publisher.subscriber_count(),
    })
}
