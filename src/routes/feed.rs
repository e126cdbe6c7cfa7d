//! Staff change feed — pushes store change events over a WebSocket.
//!
//! DESIGN
//! ======
//! Dashboards subscribe here instead of polling. Each connection owns one
//! broadcast receiver and forwards every `StoreEvent` as a JSON text message,
//! e.g. `{"event":"attendance_changed"}`. Messages from the client are
//! ignored apart from close.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade (requires a staff session) → send `{"event":"connected"}`
//! 2. Forward events until the client closes or the channel shuts down
//! 3. A lagging client skips the missed events; the next one tells it to
//!    refetch anyway

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::auth::StaffUser;
use crate::state::AppState;
use crate::store::StoreEvent;

const CONNECTED: &str = r#"{"event":"connected"}"#;

/// `GET /api/staff/feed`
pub async fn handle_feed(State(state): State<AppState>, _staff: StaffUser, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_feed(socket, state))
}

async fn run_feed(mut socket: WebSocket, state: AppState) {
    let mut events = state.store.subscribe();
    if socket.send(Message::Text(CONNECTED.into())).await.is_err() {
        return;
    }
    info!("feed: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send_event(&mut socket, event).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "feed: client lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!("feed: client disconnected");
}

async fn send_event(socket: &mut WebSocket, event: StoreEvent) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(&event) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "feed: event encode failed");
            return Ok(());
        }
    };
    socket.send(Message::Text(text.into())).await
}

#[cfg(test)]
#[path = "feed_test.rs"]
mod tests;
