//! Alert Routes

use axum::{
    extract::{Query, State},
    Json,
};
use dms::AlertKind;
use serde::{Deserialize, Serialize};
use storage::StoredAlert;

use crate::{ApiError, ApiResult, AppState};

const MAX_LIMIT: u32 = 500;

/// Query parameters for alerts endpoint
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// `drowsiness` or `yawning`
    pub kind: Option<String>,
    /// Maximum number of records
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// Response for alerts endpoint
#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub data: Vec<StoredAlert>,
    pub count: usize,
    pub total: i64,
}

fn parse_kind(kind: &str) -> ApiResult<AlertKind> {
    match kind {
        "drowsiness" => Ok(AlertKind::Drowsiness),
        "yawning" => Ok(AlertKind::Yawning),
        other => Err(ApiError::BadRequest(format!("Unknown alert kind: {other}"))),
    }
}

/// Persisted alert history, newest first
pub async fn get_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertQuery>,
) -> ApiResult<Json<AlertResponse>> {
    let repository = state
        .repository
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Alert history is not enabled".into()))?;

    let kind = params.kind.as_deref().map(parse_kind).transpose()?;
    let alerts = repository
        .recent_alerts(kind, params.limit.min(MAX_LIMIT))
        .await?;
    let total = repository.alert_count().await?;

    Ok(Json(AlertResponse {
        count: alerts.len(),
        total,
        data: alerts,
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{get, send, state};
    use alerting::AlertRecord;
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use dms::{AlertKind, AlertLevel};
    use storage::Repository;

    async fn repository() -> Repository {
        let repository = Repository::in_memory().await.unwrap();
        for (kind, minutes_ago) in [
            (AlertKind::Drowsiness, 3),
            (AlertKind::Yawning, 2),
            (AlertKind::Drowsiness, 1),
        ] {
            repository
                .insert_alert(&AlertRecord {
                    kind,
                    ear: 0.12,
                    mar: 0.4,
                    alert_level: kind.level(),
                    message: format!("{kind} alert"),
                    timestamp: Utc::now() - Duration::minutes(minutes_ago),
                    duration: 2.1,
                })
                .await
                .unwrap();
        }
        repository
    }

    #[tokio::test]
    async fn test_alert_history_filtered_by_kind() {
        let (state, _rx) = state();
        let state = state.with_repository(repository().await);

        let (status, body) = send(state, get("/api/v1/alerts?kind=drowsiness&limit=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["total"], 3);
        assert_eq!(body["data"][0]["type"], "drowsiness");
        assert_eq!(body["data"][0]["alert_level"], AlertLevel::Danger.as_str());
    }

    #[tokio::test]
    async fn test_unknown_kind_is_rejected() {
        let (state, _rx) = state();
        let state = state.with_repository(repository().await);

        let (status, body) = send(state, get("/api/v1/alerts?kind=sneezing")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_history_requires_storage() {
        let (state, _rx) = state();
        let (status, _) = send(state, get("/api/v1/alerts")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
