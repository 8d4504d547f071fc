//! Connection identity and outbound mailbox.

use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::Frame;

/// Receiving end of a connection's outbound queue, drained by the outbound pump
pub type Mailbox = mpsc::Receiver<Frame>;

/// Unique identifier for a WebSocket connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh, process-unique identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A live endpoint as seen by the hub.
///
/// Holds the only sender for the connection's mailbox. Once the hub drops it
/// (deregistration or eviction) the mailbox is closed and the outbound pump
/// drains what is left and exits.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    outbox: mpsc::Sender<Frame>,
}

impl Connection {
    /// Create a connection with a fresh identity and a mailbox holding at
    /// most `capacity` pending frames.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Configuration loading rejects that value.
    pub fn new(capacity: usize) -> (Self, Mailbox) {
        Self::with_id(ConnectionId::generate(), capacity)
    }

    /// Create a connection with a caller-chosen identity
    pub fn with_id(id: ConnectionId, capacity: usize) -> (Self, Mailbox) {
        let (outbox, mailbox) = mpsc::channel(capacity);
        (Self { id, outbox }, mailbox)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub(crate) fn into_parts(self) -> (ConnectionId, mpsc::Sender<Frame>) {
        (self.id, self.outbox)
    }
}
