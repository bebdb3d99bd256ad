//! WebSocket support for real-time job and batch updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::Utc;
use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use stillreel_core::{BatchStatus, Job, JobEvent, JobId};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// Interval between heartbeats on an idle connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket message sent to clients for real-time updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// A file was accepted and a job created.
    JobCreated { job: Job },
    /// A job changed status or progress.
    JobUpdated { job: Job },
    /// A job and its bytes were released.
    JobRemoved { job_id: JobId },
    /// Every job was released.
    JobsCleared { removed: usize },
    /// Aggregate batch progress.
    BatchStatus { status: BatchStatus },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn type_name(&self) -> &'static str {
        match self {
            WsMessage::JobCreated { .. } => "job_created",
            WsMessage::JobUpdated { .. } => "job_updated",
            WsMessage::JobRemoved { .. } => "job_removed",
            WsMessage::JobsCleared { .. } => "jobs_cleared",
            WsMessage::BatchStatus { .. } => "batch_status",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

impl From<&JobEvent> for WsMessage {
    fn from(event: &JobEvent) -> Self {
        match event {
            JobEvent::Created { job } => WsMessage::JobCreated { job: job.clone() },
            JobEvent::Updated { job } => WsMessage::JobUpdated { job: job.clone() },
            JobEvent::Removed { job_id } => WsMessage::JobRemoved { job_id: *job_id },
            JobEvent::Cleared { removed } => WsMessage::JobsCleared { removed: *removed },
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // No receivers is not an error
        let _ = self.sender.send(msg);
    }

    /// Subscribe to receive messages.
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    pub fn job_event(&self, event: &JobEvent) {
        self.broadcast(WsMessage::from(event));
    }

    pub fn batch_status(&self, status: &BatchStatus) {
        self.broadcast(WsMessage::BatchStatus {
            status: status.clone(),
        });
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        // Progress updates arrive in bursts during a run
        Self::new(1024)
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut rx = state.ws_broadcaster().subscribe();
    let initial = WsMessage::BatchStatus {
        status: state.orchestrator().status(),
    };

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        if !send_message(&mut sender, &initial).await {
            return;
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(msg) => {
                            if !send_message(&mut sender, &msg).await {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("WebSocket client lagged, skipped {} messages", n);
                            WS_LAG_EVENTS.inc();
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Broadcast channel closed");
                            break;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    let msg = WsMessage::Heartbeat { timestamp: Utc::now().timestamp() };
                    if !send_message(&mut sender, &msg).await {
                        break;
                    }
                }
            }
        }
    });

    // Clients only ever close; anything else is logged and ignored
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Received text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

/// Serializes and sends one message. Returns false once the client is gone.
async fn send_message<S>(sender: &mut S, msg: &WsMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize WsMessage: {}", e);
            return true;
        }
    };

    if sender.send(Message::Text(json.into())).await.is_err() {
        debug!("WebSocket send failed, client disconnected");
        return false;
    }
    WS_MESSAGES_SENT.with_label_values(&[msg.type_name()]).inc();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_removed_serializes_with_type_tag() {
        let job_id = JobId::new();
        let json = serde_json::to_value(WsMessage::JobRemoved { job_id }).unwrap();
        assert_eq!(json["type"], "job_removed");
        assert_eq!(json["job_id"], job_id.to_string());
    }

    #[test]
    fn test_batch_status_serializes() {
        let json = serde_json::to_value(WsMessage::BatchStatus {
            status: BatchStatus {
                running: true,
                total: 3,
                finished: 1,
                current: None,
                duration_secs: 4.5,
            },
        })
        .unwrap();
        assert_eq!(json["type"], "batch_status");
        assert_eq!(json["status"]["running"], true);
        assert_eq!(json["status"]["total"], 3);
        assert!(json["status"].get("current").is_none());
    }

    #[tokio::test]
    async fn test_broadcaster_forwards_job_events() {
        let broadcaster = WsBroadcaster::new(16);
        let mut rx = broadcaster.subscribe();

        broadcaster.job_event(&JobEvent::Cleared { removed: 4 });

        match rx.recv().await.unwrap() {
            WsMessage::JobsCleared { removed } => assert_eq!(removed, 4),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_broadcast_without_subscribers_is_ignored() {
        let broadcaster = WsBroadcaster::default();
        broadcaster.batch_status(&BatchStatus::default());
    }
}
