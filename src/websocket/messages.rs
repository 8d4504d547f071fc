//! WebSocket Message Types
//!
//! Defines the envelope exchanged between peers and the hub. The JSON form
//! is the wire contract: empty fields are omitted rather than sent as `""`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::connection::ConnectionId;

/// Content of the notice sent to existing peers when someone joins
pub const JOIN_NOTICE: &str = "A new connection has been established";

/// An encoded envelope, ready to be written to any number of mailboxes
pub type Frame = Arc<str>;

/// A message travelling through the hub
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Identity of the originating connection (empty for system messages)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sender: String,
    /// Reserved for direct addressing; fan-out ignores it
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub receiver: String,
    /// Opaque payload
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
}

impl Envelope {
    /// Wrap a frame read from a peer
    pub fn from_peer(sender: &ConnectionId, content: impl Into<String>) -> Self {
        Self {
            sender: sender.to_string(),
            receiver: String::new(),
            content: content.into(),
        }
    }

    /// Create a hub-originated message with no sender
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Notice broadcast when a connection registers
    pub fn joined() -> Self {
        Self::system(JOIN_NOTICE)
    }

    /// Notice broadcast when a connection deregisters
    pub fn disconnected(id: &ConnectionId) -> Self {
        Self::system(format!("connection {} disconnected", id))
    }

    /// Whether the hub itself produced this envelope
    pub fn is_system(&self) -> bool {
        self.sender.is_empty()
    }

    /// Encode to the JSON wire form
    pub fn encode(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_envelope_omits_empty_fields() {
        let frame = Envelope::joined().encode().unwrap();
        assert_eq!(
            &*frame,
            r#"{"content":"A new connection has been established"}"#
        );
    }

    #[test]
    fn test_peer_envelope_serialize() {
        let id = ConnectionId::from("abc-123");
        let frame = Envelope::from_peer(&id, "hi").encode().unwrap();
        assert_eq!(&*frame, r#"{"sender":"abc-123","content":"hi"}"#);
    }

    #[test]
    fn test_empty_content_is_omitted() {
        let id = ConnectionId::from("abc-123");
        let json = Envelope::from_peer(&id, "").encode().unwrap();
        assert!(!json.contains("content"));
        assert!(!json.contains("receiver"));
    }

    #[test]
    fn test_deserialize_partial_envelope() {
        let msg: Envelope = serde_json::from_str(r#"{"content": "hello"}"#).unwrap();
        assert!(msg.is_system());
        assert_eq!(msg.content, "hello");
        assert!(msg.receiver.is_empty());
    }

    #[test]
    fn test_disconnected_notice_names_connection() {
        let id = ConnectionId::from("d-42");
        let msg = Envelope::disconnected(&id);
        assert!(msg.is_system());
        assert_eq!(msg.content, "connection d-42 disconnected");
    }
}
