//! Statistics Route

use alerting::StatsSnapshot;
use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub eye_threshold: f32,
    pub mouth_threshold: f32,
    pub alert_duration: f64,
    pub yawn_duration: f64,
}

pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let settings = state.settings.current();
    Json(StatsResponse {
        stats: state.stats.snapshot(),
        eye_threshold: settings.thresholds.eye,
        mouth_threshold: settings.thresholds.mouth,
        alert_duration: settings.durations.drowsiness.as_secs_f64(),
        yawn_duration: settings.durations.yawning.as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use crate::test_support::{get, send, state};
    use axum::http::StatusCode;
    use chrono::Utc;
    use dms::{AlertEvent, AlertKind, FrameClassification, Thresholds};
    use std::time::Duration;

    #[tokio::test]
    async fn test_stats_count_alerts() {
        let (state, _rx) = state();
        let classification = FrameClassification::from_ratios(0.1, 0.1, 0.7, &Thresholds::default());
        for kind in [AlertKind::Drowsiness, AlertKind::Yawning, AlertKind::Drowsiness] {
            let event = AlertEvent::new(kind, &classification, Duration::from_secs(2), Utc::now());
            state.stats.record_alert(&event);
        }

        let (status, body) = send(state, get("/api/v1/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_detections"], 3);
        assert_eq!(body["drowsy_alerts"], 2);
        assert_eq!(body["yawn_alerts"], 1);
        assert_eq!(body["eye_threshold"], 0.25);
        assert_eq!(body["alert_duration"], 2.0);
        assert!(!body["last_detection"].is_null());
    }
}
