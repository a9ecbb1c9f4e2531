//! Detection statistics

use chrono::{DateTime, Utc};
use dms::{AlertEvent, AlertKind};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::sink::StatisticsRecord;

/// Process-wide counters. Alerts count once per emitted event; status
/// queries are counted separately.
#[derive(Debug)]
pub struct DetectionStats {
    started: Instant,
    started_at: DateTime<Utc>,
    status_queries: AtomicU64,
    drowsy_alerts: AtomicU64,
    yawn_alerts: AtomicU64,
    last_detection: Mutex<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: f64,
    pub status_queries: u64,
    pub total_detections: u64,
    pub drowsy_alerts: u64,
    pub yawn_alerts: u64,
    pub last_detection: Option<DateTime<Utc>>,
}

impl Default for DetectionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            status_queries: AtomicU64::new(0),
            drowsy_alerts: AtomicU64::new(0),
            yawn_alerts: AtomicU64::new(0),
            last_detection: Mutex::new(None),
        }
    }

    pub fn record_query(&self) {
        self.status_queries.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("status_queries_total").increment(1);
    }

    /// Count one alert and return the record to persist
    pub fn record_alert(&self, event: &AlertEvent) -> StatisticsRecord {
        let counter = match event.kind {
            AlertKind::Drowsiness => &self.drowsy_alerts,
            AlertKind::Yawning => &self.yawn_alerts,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let mut last = self
            .last_detection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if last.map_or(true, |prev| event.timestamp > prev) {
            *last = Some(event.timestamp);
        }
        drop(last);

        self.to_record()
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let record = self.to_record();
        StatsSnapshot {
            started_at: self.started_at,
            uptime_seconds: self.uptime_seconds(),
            status_queries: self.status_queries.load(Ordering::Relaxed),
            total_detections: record.total_detections,
            drowsy_alerts: record.drowsy_alerts,
            yawn_alerts: record.yawn_alerts,
            last_detection: record.last_detection,
        }
    }

    pub fn to_record(&self) -> StatisticsRecord {
        let drowsy_alerts = self.drowsy_alerts.load(Ordering::Relaxed);
        let yawn_alerts = self.yawn_alerts.load(Ordering::Relaxed);
        StatisticsRecord {
            total_detections: drowsy_alerts + yawn_alerts,
            drowsy_alerts,
            yawn_alerts,
            last_detection: *self
                .last_detection
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        }
    }
}
