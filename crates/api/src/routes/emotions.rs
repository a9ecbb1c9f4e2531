//! Emotion Routes

use affect::AffectScores;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EmotionResponse {
    pub enabled: bool,
    pub emotion: Option<String>,
    pub emotion_scores: AffectScores,
    pub is_analyzing: bool,
    pub last_analysis: Option<DateTime<Utc>>,
    /// Seconds before the next analysis may start
    pub next_analysis_in: f64,
}

pub async fn get_current(State(state): State<AppState>) -> Json<EmotionResponse> {
    let affect = state.coordinator.snapshot();
    Json(EmotionResponse {
        enabled: state.coordinator.is_enabled(),
        emotion: affect.label,
        emotion_scores: affect.scores,
        is_analyzing: affect.is_analyzing,
        last_analysis: affect.last_result_at,
        next_analysis_in: state.coordinator.time_until_next(Instant::now()).as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use crate::test_support::{get, send, state};
    use affect::AffectScores;
    use axum::http::StatusCode;
    use chrono::Utc;
    use std::time::Instant;

    #[tokio::test]
    async fn test_emotion_after_analysis() {
        let (state, _rx) = state();
        let now = Instant::now();
        assert!(state.coordinator.try_begin(now));
        state.coordinator.complete(
            AffectScores {
                happy: 70.0,
                sad: 10.0,
                neutral: 20.0,
            },
            now,
            Utc::now(),
        );

        let (status, body) = send(state, get("/api/v1/emotions/current")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["emotion"], "happy");
        assert_eq!(body["emotion_scores"]["happy"], 70.0);
        assert_eq!(body["is_analyzing"], false);
        assert!(body["next_analysis_in"].as_f64().unwrap() > 9.0);
    }

    #[tokio::test]
    async fn test_emotion_before_first_analysis() {
        let (state, _rx) = state();
        let (_, body) = send(state, get("/api/v1/emotions/current")).await;
        assert_eq!(body["enabled"], true);
        assert!(body["emotion"].is_null());
        assert_eq!(body["next_analysis_in"], 0.0);
    }
}
