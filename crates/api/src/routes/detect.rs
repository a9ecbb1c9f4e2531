//! Detection Routes

use alerting::StatusView;
use axum::{body::Bytes, extract::State, Json};
use camera_capture::VideoFrame;
use dms::{AlertLevel, FrameClassification, LandmarkExtractor, Thresholds};
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

use crate::{ApiError, ApiResult, AppState};

/// Status view plus the affect scheduling fields
#[derive(Debug, Serialize)]
pub struct CombinedResponse {
    #[serde(flatten)]
    pub status: StatusView,
    pub is_analyzing: bool,
    pub next_analysis_in: f64,
}

/// One-shot classification of an uploaded image
#[derive(Debug, Serialize)]
pub struct FrameResponse {
    pub face_detected: bool,
    pub ear_left: f32,
    pub ear_right: f32,
    pub ear: f32,
    pub mar: f32,
    pub is_drowsy: bool,
    pub is_yawning: bool,
    pub alert_level: AlertLevel,
    pub message: &'static str,
    pub eye_threshold: f32,
    pub mouth_threshold: f32,
}

impl FrameResponse {
    fn new(classification: &FrameClassification, thresholds: &Thresholds) -> Self {
        let level = AlertLevel::from_classification(classification);
        Self {
            face_detected: classification.face_present,
            ear_left: classification.ear_left,
            ear_right: classification.ear_right,
            ear: classification.ear_avg,
            mar: classification.mar,
            is_drowsy: classification.eyes_closed,
            is_yawning: classification.yawning,
            alert_level: level,
            message: level.message(),
            eye_threshold: thresholds.eye,
            mouth_threshold: thresholds.mouth,
        }
    }
}

/// Latest result of the sampling loop
pub async fn get_current(State(state): State<AppState>) -> Json<StatusView> {
    state.stats.record_query();
    Json(state.board.latest().view(Instant::now()))
}

pub async fn get_combined(State(state): State<AppState>) -> Json<CombinedResponse> {
    state.stats.record_query();
    let now = Instant::now();
    let affect = state.coordinator.snapshot();

    Json(CombinedResponse {
        status: state.board.latest().view(now),
        is_analyzing: affect.is_analyzing,
        next_analysis_in: state.coordinator.time_until_next(now).as_secs_f64(),
    })
}

/// Classify an uploaded JPEG/PNG body with the current thresholds
pub async fn post_frame(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<FrameResponse>> {
    let detector = state
        .frame_detector
        .clone()
        .ok_or_else(|| ApiError::Unavailable("Frame detection is not available".into()))?;
    let thresholds = state.settings.current().thresholds;
    metrics::counter!("frame_uploads_total").increment(1);

    let classification = tokio::task::spawn_blocking(move || {
        let frame = VideoFrame::decode(&body).map_err(|e| {
            debug!(error = %e, "Rejected uploaded frame");
            ApiError::BadRequest("Invalid image format".into())
        })?;

        let mut detector = detector
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let landmarks = detector
            .detect(&frame)
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or_else(|| ApiError::BadRequest("No face detected in image".into()))?;

        Ok::<_, ApiError>(FrameClassification::from_landmarks(&landmarks, &thresholds))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(FrameResponse::new(&classification, &thresholds)))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{get, send, state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use camera_capture::VideoFrame;
    use dms::{DmsError, FaceLandmarks, LandmarkExtractor, Point};

    struct StillFace {
        eye_opening: Option<f32>,
    }

    impl LandmarkExtractor for StillFace {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError> {
            Ok(self.eye_opening.map(|o| {
                let eye = [
                    Point::new(0.0, 0.0),
                    Point::new(3.0, -o / 2.0),
                    Point::new(7.0, -o / 2.0),
                    Point::new(10.0, 0.0),
                    Point::new(7.0, o / 2.0),
                    Point::new(3.0, o / 2.0),
                ];
                let mut mouth = [Point::default(); 13];
                mouth[6] = Point::new(10.0, 0.0);
                for (top, bottom) in [(2, 10), (3, 9), (4, 8), (5, 7)] {
                    mouth[top] = Point::new(5.0, -1.0);
                    mouth[bottom] = Point::new(5.0, 1.0);
                }
                FaceLandmarks {
                    right_eye: eye,
                    left_eye: eye,
                    mouth,
                }
            }))
        }
    }

    fn png() -> Vec<u8> {
        let image = image::RgbImage::from_pixel(4, 4, image::Rgb([120, 90, 60]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn upload(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/detect/frame")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_current_counts_queries() {
        let (state, _rx) = state();
        let stats = state.stats.clone();

        let (status, body) = send(state.clone(), get("/api/v1/detect/current")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["alert_level"], "unknown");
        assert_eq!(body["message"], "Waiting for detection...");
        assert_eq!(body["face_detected"], false);

        send(state, get("/api/v1/detect/combined")).await;
        assert_eq!(stats.snapshot().status_queries, 2);
    }

    #[tokio::test]
    async fn test_combined_includes_affect_schedule() {
        let (state, _rx) = state();
        let (status, body) = send(state, get("/api/v1/detect/combined")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_analyzing"], false);
        assert_eq!(body["next_analysis_in"], 0.0);
        assert_eq!(body["emotion_scores"]["neutral"], 0.0);
        assert!(body.get("ear").is_some());
    }

    #[tokio::test]
    async fn test_frame_with_closed_eyes() {
        let (state, _rx) = state();
        let state = state.with_frame_detector(Box::new(StillFace {
            eye_opening: Some(1.0),
        }));

        let (status, body) = send(state, upload(png())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["face_detected"], true);
        assert_eq!(body["is_drowsy"], true);
        assert_eq!(body["is_yawning"], false);
        assert_eq!(body["alert_level"], "danger");
    }

    #[tokio::test]
    async fn test_frame_without_face() {
        let (state, _rx) = state();
        let state = state.with_frame_detector(Box::new(StillFace { eye_opening: None }));

        let (status, body) = send(state, upload(png())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No face detected in image");
    }

    #[tokio::test]
    async fn test_frame_rejects_garbage() {
        let (state, _rx) = state();
        let state = state.with_frame_detector(Box::new(StillFace {
            eye_opening: Some(3.0),
        }));

        let (status, body) = send(state, upload(b"not an image".to_vec())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid image format");
    }

    #[tokio::test]
    async fn test_frame_without_detector() {
        let (state, _rx) = state();
        let (status, body) = send(state, upload(png())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    }
}
