//! Per-connection pumps
//!
//! Each connection runs two tasks: the inbound pump turns frames read from
//! the peer into broadcasts, and the outbound pump writes whatever the hub
//! queued in the connection's mailbox. Both are generic over the transport
//! halves so they can be driven without a socket.

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;

use super::connection::{ConnectionId, Mailbox};
use super::hub::HubHandle;
use super::messages::Envelope;

/// Read frames from the peer and submit each one to the hub as a broadcast.
///
/// Ends on read error, end of stream, a close frame, or a stopped hub, then
/// asks the hub to deregister the connection. The read half is dropped on
/// return.
pub async fn inbound_pump<S, E>(id: ConnectionId, mut stream: S, hub: HubHandle)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(result) = stream.next().await {
        let content = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            // Keep-alive frames are answered by the transport
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %id, "Client requested close");
                break;
            }
            Err(e) => {
                tracing::debug!(
                    connection_id = %id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
        };

        if hub.broadcast(Envelope::from_peer(&id, content)).is_err() {
            tracing::warn!(connection_id = %id, "Hub stopped, dropping connection");
            break;
        }
    }

    let _ = hub.deregister(id);
}

/// Write queued frames to the peer until the hub closes the mailbox.
///
/// Once the mailbox is closed and drained a close frame is sent on a
/// best-effort basis. A failed write deregisters the connection instead.
pub async fn outbound_pump<W>(id: ConnectionId, mut mailbox: Mailbox, mut sink: W, hub: HubHandle)
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    while let Some(frame) = mailbox.recv().await {
        if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
            tracing::debug!(
                connection_id = %id,
                error = %e,
                "WebSocket send failed, closing connection"
            );
            let _ = hub.deregister(id);
            return;
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}
