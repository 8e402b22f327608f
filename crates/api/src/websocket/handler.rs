//! WebSocket handler for Axum
//!
//! Upgrades the connection after credential validation, then runs one
//! task per connection: a writer task draining the connection's event
//! queue into the socket, and the read loop feeding inbound events to
//! the signaling relay. A failed authentication rejects the upgrade
//! before any presence mutation occurs.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use helplink_shared::{ClientEvent, Identity, ServerEvent};

use crate::state::AppState;

use super::{connection::Connection, signaling::route_call_event};

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: String,
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
/// Authenticates via query parameter token instead of middleware Extension
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Query(params): Query<WebSocketQuery>,
) -> Result<Response, StatusCode> {
    let identity = match app_state
        .authenticator
        .authenticate(Some(&params.token))
        .await
    {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket auth failed");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    tracing::info!(user_id = %identity.id, "WebSocket connection upgrade requested");

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, identity, app_state)))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, identity: Identity, app_state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Channel drained by the writer task; FIFO per recipient
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let conn = Arc::new(Connection::new(identity, tx));
    let session_id = conn.session_id;
    let ws_state = app_state.ws.clone();

    // Acknowledge, then register (registration triggers the room joins
    // and presence notifications)
    let _ = conn.send(ServerEvent::Connected { session_id });
    ws_state.presence.register(Arc::clone(&conn)).await;

    // Writer task: pump queued events into the socket
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                }
            }
        }
    });

    // Read loop: every inbound frame belongs to this connection's task
    while let Some(msg) = receiver.next().await {
        let Ok(msg) = msg else { break };
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    route_call_event(event, &conn, &ws_state).await;
                }
                Err(e) => {
                    tracing::warn!(
                        error = ?e,
                        session_id = %session_id,
                        "Failed to parse client event"
                    );
                    let _ = conn.send(ServerEvent::Error {
                        message: "Invalid event format".to_string(),
                    });
                }
            },
            Message::Close(_) => {
                tracing::info!(session_id = %session_id, "WebSocket close frame received");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                // Axum handles ping/pong automatically
            }
            _ => {} // Ignore binary messages
        }
    }

    // Cleanup runs exactly once per socket task; unregister itself is
    // idempotent under racing disconnect signals
    tracing::info!(session_id = %session_id, "WebSocket connection closing");
    ws_state.presence.unregister(session_id).await;

    send_task.abort();
}
