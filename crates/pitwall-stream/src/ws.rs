//! `WebSocket` transport for stream sessions.
//!
//! Clients connect to `GET /ws/stream` and receive the same sequence as
//! the SSE stream, one text frame per event. Status changes are sent as
//! `{"type": "status", "payload": {"state": ...}}`. A client close frame or
//! transport error ends the session; the end of the session closes the
//! socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::{debug, warn};

use crate::session;
use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` stream session.
///
/// # Route
///
/// `GET /ws/stream`
pub async fn ws_stream(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Forward session events to the socket until either side finishes.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let mut events = session::open(&state, "websocket");

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    debug!("Stream session ended, closing WebSocket");
                    if let Err(e) = socket.send(Message::Close(None)).await {
                        debug!("WebSocket close failed: {e}");
                    }
                    return;
                };
                let text = match event.frame() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize stream event: {e}");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    debug!("WebSocket client disconnected (send failed)");
                    return;
                }
            }
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
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
