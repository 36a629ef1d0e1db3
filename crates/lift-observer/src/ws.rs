//! `WebSocket` handler for real-time building snapshots.
//!
//! Clients connect to `GET /ws/building`, receive the current snapshot
//! straight away, and then every snapshot the engine publishes. The
//! handler uses a [`broadcast::Receiver`] so all connected clients see the
//! same stream.
//!
//! If a client falls behind, lagged messages are silently skipped and
//! the client resumes from the most recent snapshot.
//!
//! [`broadcast::Receiver`]: tokio::sync::broadcast::Receiver

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use lift_types::BuildingSnapshot;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming snapshots.
///
/// # Route
///
/// `GET /ws/building`
pub async fn ws_building(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Serialize a snapshot and send it. Returns `false` once the client is
/// gone.
async fn send_snapshot(socket: &mut WebSocket, snapshot: &BuildingSnapshot) -> bool {
    let json = match serde_json::to_string(snapshot) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize building snapshot: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Handle the `WebSocket` lifecycle: send the current snapshot, then
/// forward each broadcast as a text frame.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("WebSocket client connected");

    let mut rx = state.subscribe();

    let initial = state.building.snapshot();
    if !send_snapshot(&mut socket, &initial).await {
        debug!("WebSocket client disconnected (send failed)");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(snapshot) => {
                        if !send_snapshot(&mut socket, &snapshot).await {
                            debug!("WebSocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            // Check if the client sent a close frame or disconnected.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return;
                    }
                    _ => {
                        // Clients only listen; ignore anything else they send.
                    }
                }
            }
        }
    }
}
