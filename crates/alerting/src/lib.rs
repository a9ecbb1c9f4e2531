//! Alerting
//!
//! Read model and fan-out for the drowsiness monitor:
//! - `StatusBoard`: atomically swapped latest result for status queries
//! - `AlertPublisher`: non-blocking handoff to live subscribers and sinks
//! - `AlertSink` / `SinkWorker`: durable destinations and their drain task
//! - `DetectionStats`: alert and query counters

mod publisher;
mod sink;
mod snapshot;
mod stats;

pub use publisher::{AlertPublisher, DEFAULT_LIVE_CAPACITY, DEFAULT_SINK_CAPACITY};
pub use sink::{AlertRecord, AlertSink, EmotionRecord, SinkError, SinkRecord, SinkWorker, StatisticsRecord};
pub use snapshot::{
    EpisodeSnapshot, LatestResult, SignalProgress, SourceStatus, StatusBoard, StatusView,
};
pub use stats::{DetectionStats, StatsSnapshot};
