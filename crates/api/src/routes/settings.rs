//! Settings Route

use axum::{extract::State, Json};
use monitor::{SettingsSnapshot, SettingsUpdate};
use serde::Serialize;

use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub status: &'static str,
    pub eye_threshold: f32,
    pub mouth_threshold: f32,
    pub alert_duration: f64,
}

impl From<SettingsSnapshot> for SettingsResponse {
    fn from(snapshot: SettingsSnapshot) -> Self {
        Self {
            status: "success",
            eye_threshold: snapshot.thresholds.eye,
            mouth_threshold: snapshot.thresholds.mouth,
            alert_duration: snapshot.durations.drowsiness.as_secs_f64(),
        }
    }
}

/// Validate and apply a threshold update; rejected updates change nothing
pub async fn post_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<SettingsResponse>> {
    let applied = state.settings.update(&update)?;
    Ok(Json(applied.into()))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{post_json, send, state};
    use axum::http::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_update_applies() {
        let (state, _rx) = state();
        let settings = state.settings.clone();

        let (status, body) = send(
            state,
            post_json(
                "/api/v1/settings",
                json!({"ear_threshold": 0.3, "alert_duration": 3.0}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["mouth_threshold"], 0.5);

        let current = settings.current();
        assert_eq!(current.thresholds.eye, 0.3);
        assert_eq!(current.durations.drowsiness, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_out_of_range_is_rejected_atomically() {
        let (state, _rx) = state();
        let settings = state.settings.clone();
        let before = settings.current();

        let (status, body) = send(
            state,
            post_json(
                "/api/v1/settings",
                json!({"ear_threshold": 0.3, "mar_threshold": 1.5}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(settings.current(), before);
    }
}
