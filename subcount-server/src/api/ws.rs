//! WebSocket realtime channel
//!
//! One connection per viewer. Outbound events come from the viewer's hub
//! queue; inbound `request-update` frames trigger a poll.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use subcount_common::events::ClientEvent;
use tracing::{debug, trace, warn};

use super::AppState;
use crate::poller::PollTrigger;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// GET /ws - upgrade to the realtime channel
pub async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app))
}

/// Serve one viewer until either side goes away
async fn handle_socket(socket: WebSocket, app: AppState) {
    let (client_id, mut rx) = app.state.connect().await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: hub queue → socket, plus periodic ping
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    let text = match event.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize {} event: {}", event.name(), e);
                            continue;
                        }
                    };
                    if ws_tx.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                    trace!("Sent ping to {}", client_id);
                }
            }
        }
    });

    // Reader: socket → poll requests
    let reader_app = app.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => match ClientEvent::parse(&text) {
                    Some(ClientEvent::RequestUpdate) => {
                        debug!("{} requested an update", client_id);
                        reader_app.poller.request(PollTrigger::ClientRequest);
                    }
                    None => debug!("Ignoring unrecognised message from {}", client_id),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    app.state.disconnect(&client_id).await;
}
