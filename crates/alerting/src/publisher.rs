//! Alert fan-out to live subscribers and the durable path

use dms::AlertEvent;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::sink::{AlertRecord, SinkRecord};

/// Default buffer of the live subscriber channel
pub const DEFAULT_LIVE_CAPACITY: usize = 64;
/// Default buffer of the sink handoff channel
pub const DEFAULT_SINK_CAPACITY: usize = 256;

/// Producer side of the fan-out.
///
/// Both halves are non-blocking so the sampling thread can publish without
/// entering the async runtime: live delivery goes through a broadcast
/// channel (a receiver that falls behind observes `Lagged`), the durable
/// path through a bounded queue drained by
/// [`SinkWorker`](crate::SinkWorker).
#[derive(Debug, Clone)]
pub struct AlertPublisher {
    live: broadcast::Sender<AlertEvent>,
    sink: mpsc::Sender<SinkRecord>,
}

impl AlertPublisher {
    /// Create a publisher and the receiver to hand to the sink worker
    pub fn new(live_capacity: usize, sink_capacity: usize) -> (Self, mpsc::Receiver<SinkRecord>) {
        let (live, _) = broadcast::channel(live_capacity.max(1));
        let (sink, rx) = mpsc::channel(sink_capacity.max(1));
        (Self { live, sink }, rx)
    }

    /// Deliver an alert to live subscribers and queue its record
    pub fn publish(&self, event: &AlertEvent) {
        metrics::counter!("alerts_total", "kind" => event.kind.as_str()).increment(1);
        info!(kind = %event.kind, duration = event.duration_seconds, "{}", event.message);

        match self.live.send(event.clone()) {
            Ok(n) => debug!("Alert delivered to {} subscriber(s)", n),
            Err(_) => debug!("No live subscribers"),
        }
        self.persist(SinkRecord::Alert(AlertRecord::from(event)));
    }

    /// Queue a record for the durable sinks without waiting
    pub fn persist(&self, record: SinkRecord) {
        let collection = record.collection();
        match self.sink.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(collection, "Sink queue full, record dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(collection, "Sink worker gone, record dropped");
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.live.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.live.receiver_count()
    }
}

impl Default for AlertPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_LIVE_CAPACITY, DEFAULT_SINK_CAPACITY).0
    }
}
