//! Live event channel.
//!
//! Each WebSocket client gets the controller snapshot as an `nfc_status`
//! frame on connect, then every event published on the notification bus.
//! A client that falls behind the bus buffer skips what it missed and keeps
//! receiving from there.
//!
//! Clients may ask for a reader restart:
//!
//! ```json
//! {"event": "request_nfc_restart", "data": {"reason": "reader stuck"}}
//! ```
//!
//! The reply goes to that client only, framed like any other event.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use umbrella_reader::{ServerEvent, StartOutcome};
use umbrella_storage::DisplayMessages;

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    RequestNfcRestart(RestartRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RestartRequest {
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "client_request".to_string()
}

/// Direct replies to a client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientReply {
    RequestNfcRestart {
        status: StartOutcome,
        message: String,
    },
}

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| session(socket, state))
}

async fn session(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before taking the snapshot so nothing published in between
    // is lost.
    let mut events = state.controller.bus().subscribe();
    let snapshot = ServerEvent::NfcStatus(state.controller.status());
    if send_json(&mut sender, &snapshot).await.is_err() {
        return;
    }
    info!(
        observers = state.controller.bus().observer_count(),
        "event client connected"
    );

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    if send_json(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event client lagging, events skipped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_client_message(&state, &text).await
                        && send_json(&mut sender, &reply).await.is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "event client receive failed");
                    break;
                }
            },
        }
    }

    info!("event client disconnected");
}

/// Handle one text frame from a client. Returns the reply, if any.
pub(crate) async fn handle_client_message(state: &AppState, text: &str) -> Option<ClientReply> {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "ignoring unrecognized client message");
            return None;
        }
    };

    match event {
        ClientEvent::RequestNfcRestart(request) => {
            info!(reason = %request.reason, "reader restart requested by client");
            let status = state.controller.restart().await;
            Some(ClientReply::RequestNfcRestart {
                status,
                message: DisplayMessages::READER_RESTARTED.to_string(),
            })
        }
    }
}

async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &T,
) -> Result<(), ()> {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to encode event frame");
            return Ok(());
        }
    };

    sender.send(Message::Text(text)).await.map_err(|e| {
        debug!(error = %e, "event client send failed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use umbrella_hardware::mock::MockNfcReader;
    use umbrella_reader::{NotificationBus, ReaderConfig, ReaderController};
    use umbrella_storage::{MemoryStatusStore, UmbrellaService};

    fn state() -> AppState {
        let (reader, _handle) = MockNfcReader::new();
        AppState::new(Arc::new(ReaderController::new(
            reader,
            UmbrellaService::new(MemoryStatusStore::new()),
            NotificationBus::default(),
            ReaderConfig::default(),
        )))
    }

    #[test]
    fn test_parse_restart_request() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "request_nfc_restart",
            "data": {"reason": "reader stuck"}
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::RequestNfcRestart(RestartRequest {
                reason: "reader stuck".into()
            })
        );
    }

    #[test]
    fn test_restart_reason_defaults() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "request_nfc_restart",
            "data": {}
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::RequestNfcRestart(RestartRequest {
                reason: "client_request".into()
            })
        );
    }

    #[test]
    fn test_reply_frame_shape() {
        let reply = ClientReply::RequestNfcRestart {
            status: StartOutcome::Started,
            message: DisplayMessages::READER_RESTARTED.to_string(),
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({
                "event": "request_nfc_restart",
                "data": {"status": "started", "message": DisplayMessages::READER_RESTARTED}
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_request_restarts_reader() {
        let state = state();
        let text = r#"{"event":"request_nfc_restart","data":{"reason":"test"}}"#;

        let reply = handle_client_message(&state, text).await.unwrap();

        assert!(matches!(
            reply,
            ClientReply::RequestNfcRestart {
                status: StartOutcome::Started,
                ..
            }
        ));
        assert!(state.controller.is_active());
        state.controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_messages_are_ignored() {
        let state = state();

        assert_eq!(handle_client_message(&state, "not json").await, None);
        assert_eq!(
            handle_client_message(&state, r#"{"event":"format_disk","data":{}}"#).await,
            None
        );
        assert!(!state.controller.is_active());
    }
}
