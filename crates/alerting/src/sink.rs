//! Durable sink contract and the worker that drains records into sinks

use affect::{AffectReading, AffectScores};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dms::{AlertEvent, AlertKind, AlertLevel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Sink error types
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Persisted alert shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub ear: f32,
    pub mar: f32,
    pub alert_level: AlertLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub duration: f64,
}

impl From<&AlertEvent> for AlertRecord {
    fn from(event: &AlertEvent) -> Self {
        Self {
            kind: event.kind,
            ear: event.ear_avg,
            mar: event.mar,
            alert_level: event.kind.level(),
            message: event.message.clone(),
            timestamp: event.timestamp,
            duration: event.duration_seconds,
        }
    }
}

/// Persisted affect sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionRecord {
    pub emotion: String,
    pub emotion_scores: AffectScores,
    pub timestamp: DateTime<Utc>,
}

impl From<&AffectReading> for EmotionRecord {
    fn from(reading: &AffectReading) -> Self {
        Self {
            emotion: reading.label.clone(),
            emotion_scores: reading.scores,
            timestamp: reading.timestamp,
        }
    }
}

/// Running totals pushed after every alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRecord {
    pub total_detections: u64,
    pub drowsy_alerts: u64,
    pub yawn_alerts: u64,
    pub last_detection: Option<DateTime<Utc>>,
}

/// Anything handed to the durable path
#[derive(Debug, Clone, PartialEq)]
pub enum SinkRecord {
    Alert(AlertRecord),
    Emotion(EmotionRecord),
    Statistics(StatisticsRecord),
}

impl SinkRecord {
    /// Collection name used by topic- or table-oriented sinks
    pub fn collection(&self) -> &'static str {
        match self {
            SinkRecord::Alert(_) => "alerts",
            SinkRecord::Emotion(_) => "emotions",
            SinkRecord::Statistics(_) => "stats",
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, SinkError> {
        let value = match self {
            SinkRecord::Alert(r) => serde_json::to_value(r)?,
            SinkRecord::Emotion(r) => serde_json::to_value(r)?,
            SinkRecord::Statistics(r) => serde_json::to_value(r)?,
        };
        Ok(value)
    }
}

/// Durable destination for alert, emotion and statistics records
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn persist(&self, record: &SinkRecord) -> Result<(), SinkError>;

    fn name(&self) -> &str;
}

/// Drains the sink channel into every configured sink.
///
/// Sink failures are logged and never reach the producer.
pub struct SinkWorker;

impl SinkWorker {
    /// Runs until every sender is dropped
    pub async fn run(mut rx: mpsc::Receiver<SinkRecord>, sinks: Vec<Arc<dyn AlertSink>>) {
        info!("Sink worker started with {} sink(s)", sinks.len());
        while let Some(record) = rx.recv().await {
            for sink in &sinks {
                match sink.persist(&record).await {
                    Ok(()) => debug!(sink = sink.name(), collection = record.collection(), "Record persisted"),
                    Err(e) => error!(
                        sink = sink.name(),
                        collection = record.collection(),
                        error = %e,
                        "Failed to persist record"
                    ),
                }
            }
        }
        info!("Sink channel closed, worker shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::{FrameClassification, Thresholds};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MemorySink {
        records: Mutex<Vec<SinkRecord>>,
    }

    #[async_trait]
    impl AlertSink for MemorySink {
        async fn persist(&self, record: &SinkRecord) -> Result<(), SinkError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "memory"
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AlertSink for FailingSink {
        async fn persist(&self, _record: &SinkRecord) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("offline".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn drowsy_event() -> AlertEvent {
        let classification = FrameClassification::from_ratios(0.1, 0.12, 0.3, &Thresholds::default());
        AlertEvent::new(
            AlertKind::Drowsiness,
            &classification,
            Duration::from_millis(2040),
            Utc::now(),
        )
    }

    #[test]
    fn test_alert_record_shape() {
        let record = SinkRecord::Alert(AlertRecord::from(&drowsy_event()));
        let json = record.to_json().unwrap();

        assert_eq!(json["type"], "drowsiness");
        assert_eq!(json["alert_level"], "danger");
        assert_eq!(json["duration"], 2.0);
        assert!(json["ear"].is_number());
        assert!(json["mar"].is_number());
        assert!(json["timestamp"].is_string());
        assert_eq!(record.collection(), "alerts");
    }

    #[test]
    fn test_emotion_record_shape() {
        let reading = AffectReading {
            label: "sad".into(),
            scores: AffectScores {
                happy: 5.0,
                sad: 80.0,
                neutral: 15.0,
            },
            timestamp: Utc::now(),
        };
        let json = SinkRecord::Emotion(EmotionRecord::from(&reading)).to_json().unwrap();
        assert_eq!(json["emotion"], "sad");
        assert_eq!(json["emotion_scores"]["sad"], 80.0);
    }

    #[tokio::test]
    async fn test_worker_survives_failing_sink() {
        let memory = Arc::new(MemorySink::default());
        let sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(FailingSink), memory.clone()];
        let (tx, rx) = mpsc::channel(8);

        let worker = tokio::spawn(SinkWorker::run(rx, sinks));
        tx.send(SinkRecord::Alert(AlertRecord::from(&drowsy_event())))
            .await
            .unwrap();
        tx.send(SinkRecord::Statistics(StatisticsRecord {
            total_detections: 1,
            drowsy_alerts: 1,
            yawn_alerts: 0,
            last_detection: Some(Utc::now()),
        }))
        .await
        .unwrap();
        drop(tx);
        worker.await.unwrap();

        let records = memory.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].collection(), "stats");
    }
}
