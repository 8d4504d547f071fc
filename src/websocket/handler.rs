//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle.

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::StreamExt;
use std::sync::Arc;

use super::connection::Connection;
use super::hub::HubHandle;
use super::pump::{inbound_pump, outbound_pump};
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections.
/// It upgrades the HTTP connection to WebSocket and starts message handling.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Register an upgraded socket with the hub and run its pumps to completion
pub async fn handle_socket(socket: WebSocket, hub: HubHandle) {
    let (connection, mailbox) = Connection::new(hub.config().mailbox_capacity);
    let id = connection.id().clone();

    if let Err(e) = hub.register(connection) {
        tracing::error!(connection_id = %id, error = %e, "Failed to register WebSocket connection");
        return;
    }

    let (sender, receiver) = socket.split();
    let send_task = tokio::spawn(outbound_pump(id.clone(), mailbox, sender, hub.clone()));
    let recv_task = tokio::spawn(inbound_pump(id.clone(), receiver, hub));

    let (sent, received) = tokio::join!(send_task, recv_task);
    for result in [sent, received] {
        if let Err(e) = result {
            tracing::error!(connection_id = %id, error = %e, "Connection pump panicked");
        }
    }

    tracing::debug!(connection_id = %id, "WebSocket closed");
}
