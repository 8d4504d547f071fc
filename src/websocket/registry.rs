//! Connection Registry
//!
//! The set of live connections. Owned and mutated exclusively by the hub
//! control loop, so it needs no locking.

use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::connection::{Connection, ConnectionId};
use super::messages::Frame;

/// Live connections: ConnectionId → mailbox sender
#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, mpsc::Sender<Frame>>,
}

/// Outcome of a single fan-out pass
#[derive(Debug, Default)]
pub struct FanOut {
    /// Number of mailboxes the frame was queued on
    pub delivered: usize,
    /// Connections removed because their mailbox was full or gone
    pub evicted: Vec<ConnectionId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Returns false, leaving the registry untouched, if
    /// the identity is already present.
    pub fn insert(&mut self, connection: Connection) -> bool {
        let (id, outbox) = connection.into_parts();
        if self.connections.contains_key(&id) {
            return false;
        }
        self.connections.insert(id, outbox);
        true
    }

    /// Remove a connection, closing its mailbox. Returns false if it was not
    /// registered.
    pub fn remove(&mut self, id: &ConnectionId) -> bool {
        self.connections.remove(id).is_some()
    }

    /// Queue `frame` on every mailbox except `skip`'s without waiting.
    ///
    /// A mailbox that cannot take the frame right away is evicted on the
    /// spot: its sender is dropped, which closes it.
    pub fn fan_out(&mut self, frame: &Frame, skip: Option<&str>) -> FanOut {
        let mut outcome = FanOut::default();

        self.connections.retain(|id, outbox| {
            if skip == Some(id.as_str()) {
                return true;
            }
            match outbox.try_send(Frame::clone(frame)) {
                Ok(()) => {
                    outcome.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                    outcome.evicted.push(id.clone());
                    false
                }
            }
        });

        outcome
    }

    #[cfg(test)]
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    #[cfg(test)]
    pub fn ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.connections.keys()
    }
}
