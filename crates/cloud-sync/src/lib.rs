//! Cloud Synchronization Module
//!
//! MQTT telemetry for the drowsiness monitor. `MqttSink` is an
//! [`AlertSink`] publishing every alert, emotion change and statistics
//! update as JSON to `<prefix>/<driver_id>/<collection>`.

use alerting::{AlertSink, SinkError, SinkRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Cloud sync error types
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<CloudError> for SinkError {
    fn from(e: CloudError) -> Self {
        match e {
            CloudError::Connection(msg) => SinkError::Unavailable(msg),
            other => SinkError::Write(other.to_string()),
        }
    }
}

/// Cloud sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// MQTT broker host
    pub broker_host: String,
    /// MQTT port
    pub broker_port: u16,
    /// Driver (or vehicle) the records belong to
    pub driver_id: String,
    /// First topic segment
    pub topic_prefix: String,
    /// Keep-alive interval (seconds)
    pub keep_alive_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            driver_id: "default".to_string(),
            topic_prefix: "drowsiness".to_string(),
            keep_alive_secs: 30,
        }
    }
}

/// Envelope published for every record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryMessage {
    pub message_id: Uuid,
    pub message_type: String,
    pub driver_id: String,
    pub sent_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// MQTT telemetry sink
pub struct MqttSink {
    config: CloudConfig,
    client: Option<AsyncClient>,
}

impl MqttSink {
    pub fn new(config: CloudConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    /// Create the client and spawn its event loop on the current runtime.
    /// The connection itself is established (and re-established) by the
    /// event loop.
    pub fn connect(&mut self) -> Result<(), CloudError> {
        if self.config.broker_host.is_empty() {
            return Err(CloudError::Connection("no broker host configured".into()));
        }

        let mut options = MqttOptions::new(
            format!("drowsiness-{}", self.config.driver_id),
            &self.config.broker_host,
            self.config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs.max(5)));

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(incoming)) => {
                        debug!("MQTT incoming: {:?}", incoming);
                    }
                    Err(e) => {
                        error!("MQTT error: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    _ => {}
                }
            }
        });

        self.client = Some(client);
        info!(
            "MQTT telemetry to {}:{} as {}",
            self.config.broker_host, self.config.broker_port, self.config.driver_id
        );
        Ok(())
    }

    pub fn topic(&self, record: &SinkRecord) -> String {
        format!(
            "{}/{}/{}",
            self.config.topic_prefix,
            self.config.driver_id,
            record.collection()
        )
    }

    pub fn encode(&self, record: &SinkRecord) -> Result<Vec<u8>, CloudError> {
        let message = TelemetryMessage {
            message_id: Uuid::new_v4(),
            message_type: record.collection().to_string(),
            driver_id: self.config.driver_id.clone(),
            sent_at: Utc::now(),
            payload: record
                .to_json()
                .map_err(|e| CloudError::Serialization(e.to_string()))?,
        };
        serde_json::to_vec(&message).map_err(|e| CloudError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl AlertSink for MqttSink {
    async fn persist(&self, record: &SinkRecord) -> Result<(), SinkError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| CloudError::Connection("Not connected".to_string()))?;

        let payload = self.encode(record)?;
        client
            .publish(self.topic(record), QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| CloudError::Publish(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "mqtt"
    }
}
