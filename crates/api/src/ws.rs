//! Live alert subscription over WebSocket
//!
//! Each connection gets its own broadcast receiver. A subscriber that
//! falls behind the broadcast buffer is disconnected rather than slowing
//! the sampling loop down.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use dms::AlertEvent;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};

use crate::AppState;

/// HTTP handler that upgrades the connection to WebSocket
pub async fn ws_alerts(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let alerts = state.publisher.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, alerts))
}

pub(crate) fn connected_frame() -> Value {
    json!({
        "type": "connected",
        "message": "Connected to drowsiness alerts",
        "timestamp": Utc::now(),
    })
}

pub(crate) fn alert_frame(event: &AlertEvent) -> Value {
    json!({
        "type": "alert",
        "alert_type": event.kind,
        "ear": event.ear_avg,
        "mar": event.mar,
        "alert_level": event.kind.level(),
        "message": event.message,
        "timestamp": event.timestamp,
        "duration": event.duration_seconds,
    })
}

pub(crate) fn pong_frame() -> Value {
    json!({ "type": "pong" })
}

async fn handle_socket(socket: WebSocket, mut alerts: broadcast::Receiver<AlertEvent>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "Alert subscriber connected");

    let (mut sink, mut stream) = socket.split();
    let (pong_tx, mut pong_rx) = mpsc::channel::<()>(8);

    let sender_conn_id = conn_id.clone();
    let mut send_task = tokio::spawn(async move {
        if sink
            .send(Message::Text(connected_frame().to_string()))
            .await
            .is_err()
        {
            return;
        }

        loop {
            let frame = tokio::select! {
                received = alerts.recv() => match received {
                    Ok(event) => alert_frame(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(conn_id = %sender_conn_id, skipped, "Alert subscriber lagged, disconnecting");
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                ping = pong_rx.recv() => match ping {
                    Some(()) => pong_frame(),
                    None => break,
                },
            };

            if sink.send(Message::Text(frame.to_string())).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) if text.trim() == "ping" => {
                    let _ = pong_tx.try_send(());
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }

    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Alert subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::{AlertKind, FrameClassification, Thresholds};
    use std::time::Duration;

    #[test]
    fn test_alert_frame_shape() {
        let classification = FrameClassification::from_ratios(0.3, 0.3, 0.8, &Thresholds::default());
        let event = AlertEvent::new(
            AlertKind::Yawning,
            &classification,
            Duration::from_millis(1_240),
            Utc::now(),
        );

        let frame = alert_frame(&event);
        assert_eq!(frame["type"], "alert");
        assert_eq!(frame["alert_type"], "yawning");
        assert_eq!(frame["alert_level"], "warning");
        assert_eq!(frame["duration"], 1.2);
        assert_eq!(frame["message"], "YAWNING DETECTED! Mouth open for 1.2s");
        assert!(frame["timestamp"].is_string());
    }

    #[test]
    fn test_handshake_and_pong_frames() {
        assert_eq!(connected_frame()["type"], "connected");
        assert_eq!(pong_frame(), json!({"type": "pong"}));
    }
}
