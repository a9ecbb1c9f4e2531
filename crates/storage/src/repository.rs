//! Repository Implementation

use crate::StorageError;
use alerting::{AlertRecord, AlertSink, EmotionRecord, SinkError, SinkRecord, StatisticsRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dms::AlertKind;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        ear REAL NOT NULL,
        mar REAL NOT NULL,
        alert_level TEXT NOT NULL,
        message TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        duration REAL NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts (timestamp)",
    "CREATE TABLE IF NOT EXISTS emotions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        emotion TEXT NOT NULL,
        happy REAL NOT NULL,
        sad REAL NOT NULL,
        neutral REAL NOT NULL,
        timestamp TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS statistics (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        total_detections INTEGER NOT NULL,
        drowsy_alerts INTEGER NOT NULL,
        yawn_alerts INTEGER NOT NULL,
        last_detection TEXT,
        updated_at TEXT NOT NULL
    )",
];

const ALERT_COLUMNS: &str = "id, kind, ear, mar, alert_level, message, timestamp, duration";

/// Alert row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredAlert {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub ear: f64,
    pub mar: f64,
    pub alert_level: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub duration: f64,
}

/// Emotion row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredEmotion {
    pub id: i64,
    pub emotion: String,
    pub happy: f64,
    pub sad: f64,
    pub neutral: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct StatisticsRow {
    total_detections: i64,
    drowsy_alerts: i64,
    yawn_alerts: i64,
    last_detection: Option<DateTime<Utc>>,
}

/// SQLite-backed repository
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Open (creating if needed) the database at `url` and apply the schema.
    ///
    /// In-memory databases get a single connection so every query sees the
    /// same data.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        info!("Opening database {}", url);
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let repo = Self { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    /// In-memory database (tests, dry runs)
    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Schema ready");
        Ok(())
    }

    /// Insert an alert record, returning its row id
    pub async fn insert_alert(&self, record: &AlertRecord) -> Result<i64, StorageError> {
        let id = sqlx::query(
            "INSERT INTO alerts (kind, ear, mar, alert_level, message, timestamp, duration) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.kind.as_str())
        .bind(record.ear as f64)
        .bind(record.mar as f64)
        .bind(record.alert_level.as_str())
        .bind(&record.message)
        .bind(record.timestamp)
        .bind(record.duration)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!("Inserted {} alert with ID {}", record.kind, id);
        Ok(id)
    }

    /// Insert an emotion record, returning its row id
    pub async fn insert_emotion(&self, record: &EmotionRecord) -> Result<i64, StorageError> {
        let id = sqlx::query(
            "INSERT INTO emotions (emotion, happy, sad, neutral, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.emotion)
        .bind(record.emotion_scores.happy as f64)
        .bind(record.emotion_scores.sad as f64)
        .bind(record.emotion_scores.neutral as f64)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    /// Replace the single statistics row
    pub async fn upsert_statistics(&self, record: &StatisticsRecord) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO statistics (id, total_detections, drowsy_alerts, yawn_alerts, last_detection, updated_at) \
             VALUES (1, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                total_detections = excluded.total_detections, \
                drowsy_alerts = excluded.drowsy_alerts, \
                yawn_alerts = excluded.yawn_alerts, \
                last_detection = excluded.last_detection, \
                updated_at = excluded.updated_at",
        )
        .bind(record.total_detections as i64)
        .bind(record.drowsy_alerts as i64)
        .bind(record.yawn_alerts as i64)
        .bind(record.last_detection)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest alerts first, optionally of one kind
    pub async fn recent_alerts(
        &self,
        kind: Option<AlertKind>,
        limit: u32,
    ) -> Result<Vec<StoredAlert>, StorageError> {
        let rows = match kind {
            Some(kind) => {
                let query = format!(
                    "SELECT {ALERT_COLUMNS} FROM alerts WHERE kind = ? ORDER BY timestamp DESC, id DESC LIMIT ?"
                );
                sqlx::query_as::<_, StoredAlert>(&query)
                    .bind(kind.as_str())
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let query =
                    format!("SELECT {ALERT_COLUMNS} FROM alerts ORDER BY timestamp DESC, id DESC LIMIT ?");
                sqlx::query_as::<_, StoredAlert>(&query)
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    /// Newest emotion samples first
    pub async fn recent_emotions(&self, limit: u32) -> Result<Vec<StoredEmotion>, StorageError> {
        let rows = sqlx::query_as::<_, StoredEmotion>(
            "SELECT id, emotion, happy, sad, neutral, timestamp FROM emotions \
             ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Last persisted statistics, if any alert has been recorded
    pub async fn statistics(&self) -> Result<Option<StatisticsRecord>, StorageError> {
        let row = sqlx::query_as::<_, StatisticsRow>(
            "SELECT total_detections, drowsy_alerts, yawn_alerts, last_detection FROM statistics WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| StatisticsRecord {
            total_detections: r.total_detections.max(0) as u64,
            drowsy_alerts: r.drowsy_alerts.max(0) as u64,
            yawn_alerts: r.yawn_alerts.max(0) as u64,
            last_detection: r.last_detection,
        }))
    }

    pub async fn alert_count(&self) -> Result<i64, StorageError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM alerts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl AlertSink for Repository {
    async fn persist(&self, record: &SinkRecord) -> Result<(), SinkError> {
        let result = match record {
            SinkRecord::Alert(alert) => self.insert_alert(alert).await.map(|_| ()),
            SinkRecord::Emotion(emotion) => self.insert_emotion(emotion).await.map(|_| ()),
            SinkRecord::Statistics(stats) => self.upsert_statistics(stats).await,
        };
        result.map_err(|e| SinkError::Write(e.to_string()))
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use dms::AlertLevel;

    fn alert(kind: AlertKind, seconds_ago: i64) -> AlertRecord {
        AlertRecord {
            kind,
            ear: 0.12,
            mar: 0.4,
            alert_level: kind.level(),
            message: format!("{} alert", kind),
            timestamp: Utc::now() - Duration::seconds(seconds_ago),
            duration: 2.1,
        }
    }

    #[tokio::test]
    async fn test_alert_insert_and_retrieve() {
        let repo = Repository::in_memory().await.unwrap();
        let id = repo.insert_alert(&alert(AlertKind::Drowsiness, 0)).await.unwrap();
        assert_eq!(id, 1);

        let alerts = repo.recent_alerts(None, 10).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, "drowsiness");
        assert_eq!(alerts[0].alert_level, AlertLevel::Danger.as_str());
        assert!((alerts[0].duration - 2.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_recent_alerts_filter_and_order() {
        let repo = Repository::in_memory().await.unwrap();
        repo.insert_alert(&alert(AlertKind::Drowsiness, 30)).await.unwrap();
        repo.insert_alert(&alert(AlertKind::Yawning, 20)).await.unwrap();
        repo.insert_alert(&alert(AlertKind::Drowsiness, 10)).await.unwrap();

        let drowsy = repo.recent_alerts(Some(AlertKind::Drowsiness), 10).await.unwrap();
        assert_eq!(drowsy.len(), 2);
        assert!(drowsy[0].timestamp > drowsy[1].timestamp);

        let limited = repo.recent_alerts(None, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, 3);
        assert_eq!(repo.alert_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_statistics_upsert_keeps_one_row() {
        let repo = Repository::in_memory().await.unwrap();
        assert!(repo.statistics().await.unwrap().is_none());

        for n in 1..=3u64 {
            repo.upsert_statistics(&StatisticsRecord {
                total_detections: n,
                drowsy_alerts: n,
                yawn_alerts: 0,
                last_detection: Some(Utc::now()),
            })
            .await
            .unwrap();
        }

        let stats = repo.statistics().await.unwrap().unwrap();
        assert_eq!(stats.total_detections, 3);
        assert_eq!(stats.drowsy_alerts, 3);
        assert!(stats.last_detection.is_some());
    }

    #[tokio::test]
    async fn test_repository_as_sink() {
        let repo = Repository::in_memory().await.unwrap();
        let sink: &dyn AlertSink = &repo;

        sink.persist(&SinkRecord::Alert(alert(AlertKind::Yawning, 0)))
            .await
            .unwrap();
        sink.persist(&SinkRecord::Emotion(EmotionRecord {
            emotion: "neutral".into(),
            emotion_scores: Default::default(),
            timestamp: Utc::now(),
        }))
        .await
        .unwrap();

        assert_eq!(repo.recent_alerts(Some(AlertKind::Yawning), 5).await.unwrap().len(), 1);
        let emotions = repo.recent_emotions(5).await.unwrap();
        assert_eq!(emotions[0].emotion, "neutral");
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("alerts.db").display());

        {
            let repo = Repository::connect(&url).await.unwrap();
            repo.insert_alert(&alert(AlertKind::Drowsiness, 0)).await.unwrap();
        }
        let reopened = Repository::connect(&url).await.unwrap();
        assert_eq!(reopened.alert_count().await.unwrap(), 1);
    }
}
