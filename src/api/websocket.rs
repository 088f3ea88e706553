//! WebSocket event stream
//!
//! Subscribers connect to `/ws` and receive every [`GatewayEvent`] as a JSON
//! text frame. A fresh subscriber is sent the current status (and the
//! pending QR payload, if any) immediately, so clients never have to poll
//! for initial state.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use tokio::sync::broadcast;

use super::ApiState;
use crate::events::GatewayEvent;

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ws", get(ws_upgrade)).with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(
    State(state): State<Arc<ApiState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Forward bus events to one connected client
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.bus.subscribe();

    tracing::info!("WebSocket subscriber connected");

    // Initial snapshot so the client doesn't wait for the next transition
    let status = state.session.status_payload().await;
    if send_event(&mut sender, &GatewayEvent::Status(status)).await.is_err() {
        return;
    }
    if let Some(qr) = state.session.current_qr().await {
        if send_event(&mut sender, &GatewayEvent::Qr { qr }).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "WebSocket subscriber lagging, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                // Clients only ever listen; any frame but close is ignored
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!("WebSocket subscriber disconnected");
}

/// Serialize and send one event frame
async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).unwrap_or_default();
    sender.send(Message::Text(text.into())).await
}
