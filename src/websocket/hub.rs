//! WebSocket Connection Hub
//!
//! The single point where shared connection state changes. Registration,
//! deregistration and broadcast requests are queued as commands on one
//! channel and applied one at a time by [`Hub::run`], so every broadcast sees
//! exactly the connections registered before it was handled.

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use super::connection::{Connection, ConnectionId};
use super::messages::Envelope;
use super::registry::Registry;

/// Configuration for the connection hub
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Pending frames a connection may have queued before it is evicted
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

fn default_mailbox_capacity() -> usize {
    256
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

/// Requests handled by the control loop
#[derive(Debug)]
enum HubCommand {
    Register(Connection),
    Deregister(ConnectionId),
    Broadcast(Envelope),
}

/// The hub control loop. Owns the registry.
pub struct Hub {
    registry: Registry,
    commands: mpsc::UnboundedReceiver<HubCommand>,
    connections: watch::Sender<usize>,
}

/// Cloneable handle used by the bootstrap and by every pump to reach the hub
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
    connections: watch::Receiver<usize>,
    config: HubConfig,
}

impl Hub {
    /// Create a hub and its handle. The loop does nothing until [`Hub::run`]
    /// is polled.
    ///
    /// A `mailbox_capacity` of zero is raised to one, since a mailbox must
    /// hold at least one pending frame.
    pub fn new(mut config: HubConfig) -> (Self, HubHandle) {
        if config.mailbox_capacity == 0 {
            tracing::warn!("Mailbox capacity of 0 is not usable, using 1");
            config.mailbox_capacity = 1;
        }

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (count_tx, count_rx) = watch::channel(0);

        let hub = Self {
            registry: Registry::new(),
            commands: commands_rx,
            connections: count_tx,
        };
        let handle = HubHandle {
            commands: commands_tx,
            connections: count_rx,
            config,
        };
        (hub, handle)
    }

    /// Create a hub and run it on the current tokio runtime
    pub fn spawn(config: HubConfig) -> HubHandle {
        let (hub, handle) = Self::new(config);
        tokio::spawn(hub.run());
        handle
    }

    /// Process commands until every [`HubHandle`] has been dropped
    pub async fn run(mut self) {
        tracing::debug!("Hub control loop started");

        while let Some(command) = self.commands.recv().await {
            self.handle(command);
            self.connections.send_replace(self.registry.len());
        }

        tracing::debug!(
            connections = self.registry.len(),
            "Hub control loop stopped"
        );
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(connection) => self.register(connection),
            HubCommand::Deregister(id) => self.deregister(&id),
            HubCommand::Broadcast(envelope) => {
                self.fan_out(&envelope, None);
            }
        }
    }

    fn register(&mut self, connection: Connection) {
        let id = connection.id().clone();
        if !self.registry.insert(connection) {
            tracing::warn!(connection_id = %id, "Connection registered twice, ignoring");
            return;
        }

        tracing::info!(
            connection_id = %id,
            connections = self.registry.len(),
            "WebSocket connected"
        );
        self.fan_out(&Envelope::joined(), Some(&id));
    }

    fn deregister(&mut self, id: &ConnectionId) {
        if !self.registry.remove(id) {
            tracing::debug!(connection_id = %id, "Connection already deregistered");
            return;
        }

        tracing::info!(
            connection_id = %id,
            connections = self.registry.len(),
            "WebSocket disconnected"
        );
        self.fan_out(&Envelope::disconnected(id), None);
    }

    /// Deliver to everyone except the sender (or `exclude` for system
    /// notices), evicting mailboxes that cannot keep up.
    fn fan_out(&mut self, envelope: &Envelope, exclude: Option<&ConnectionId>) {
        let frame = match envelope.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode envelope, dropping broadcast");
                return;
            }
        };

        let skip = match exclude {
            Some(id) => Some(id.as_str()),
            None if envelope.is_system() => None,
            None => Some(envelope.sender.as_str()),
        };
        let outcome = self.registry.fan_out(&frame, skip);

        for id in &outcome.evicted {
            tracing::warn!(connection_id = %id, "Mailbox full, evicting slow connection");
        }
        tracing::trace!(
            sender = %envelope.sender,
            recipients = outcome.delivered,
            "Broadcast envelope"
        );
    }
}

impl HubHandle {
    /// Queue a new connection for registration
    pub fn register(&self, connection: Connection) -> Result<(), HubError> {
        self.submit(HubCommand::Register(connection))
    }

    /// Queue removal of a connection. Removing an unknown or already removed
    /// connection is a no-op.
    pub fn deregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.submit(HubCommand::Deregister(id))
    }

    /// Queue an envelope for delivery to every connection but its sender
    pub fn broadcast(&self, envelope: Envelope) -> Result<(), HubError> {
        self.submit(HubCommand::Broadcast(envelope))
    }

    /// Live connection count as of the last processed command
    pub fn connection_count(&self) -> usize {
        *self.connections.borrow()
    }

    /// Whether the control loop is still accepting commands
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    fn submit(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands.send(command).map_err(|_| HubError::Stopped)
    }
}

/// Errors that can occur in the connection hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Hub control loop has stopped")]
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::Mailbox;
    use tokio::sync::mpsc::error::TryRecvError;

    fn spawn_hub() -> HubHandle {
        Hub::spawn(HubConfig::default())
    }

    fn join(hub: &HubHandle, id: &str, capacity: usize) -> (ConnectionId, Mailbox) {
        let (conn, mailbox) = Connection::with_id(ConnectionId::from(id), capacity);
        let id = conn.id().clone();
        hub.register(conn).unwrap();
        (id, mailbox)
    }

    async fn next(mailbox: &mut Mailbox) -> Envelope {
        let frame = mailbox.recv().await.expect("mailbox closed");
        serde_json::from_str(&frame).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.mailbox_capacity, 256);
    }

    #[tokio::test]
    async fn test_zero_mailbox_capacity_raised_to_one() {
        let hub = Hub::spawn(HubConfig {
            mailbox_capacity: 0,
        });
        assert_eq!(hub.config().mailbox_capacity, 1);

        // Connections built from the hub's config must not panic
        let (conn, mut rx) = Connection::new(hub.config().mailbox_capacity);
        let (other, _other_rx) = Connection::new(hub.config().mailbox_capacity);
        hub.register(conn).unwrap();
        hub.register(other).unwrap();
        assert_eq!(next(&mut rx).await, Envelope::joined());
    }

    #[tokio::test]
    async fn test_register_notifies_existing_connections_only() {
        let hub = spawn_hub();
        let (_b, mut b_rx) = join(&hub, "b", 8);
        let (_c, mut c_rx) = join(&hub, "c", 8);

        // b hears about c; c does not hear about itself
        assert_eq!(next(&mut b_rx).await, Envelope::joined());
        let (_a, mut a_rx) = join(&hub, "a", 8);
        assert_eq!(next(&mut b_rx).await, Envelope::joined());
        assert_eq!(next(&mut c_rx).await, Envelope::joined());
        assert_eq!(a_rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(hub.connection_count(), 3);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_others_but_not_sender() {
        let hub = spawn_hub();
        let (_b, mut b_rx) = join(&hub, "b", 8);
        let (_c, mut c_rx) = join(&hub, "c", 8);
        let (a, mut a_rx) = join(&hub, "a", 8);

        hub.broadcast(Envelope::from_peer(&a, "hi")).unwrap();

        assert_eq!(next(&mut b_rx).await, Envelope::joined()); // c
        assert_eq!(next(&mut b_rx).await, Envelope::joined()); // a
        assert_eq!(next(&mut c_rx).await, Envelope::joined()); // a

        let expected = Envelope::from_peer(&a, "hi");
        assert_eq!(next(&mut b_rx).await, expected);
        assert_eq!(next(&mut c_rx).await, expected);
        assert_eq!(a_rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(b_rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_deregister_closes_mailbox_and_notifies() {
        let hub = spawn_hub();
        let (_b, mut b_rx) = join(&hub, "b", 8);
        let (d, mut d_rx) = join(&hub, "d", 8);

        hub.deregister(d.clone()).unwrap();

        assert_eq!(next(&mut b_rx).await, Envelope::joined());
        assert_eq!(next(&mut b_rx).await, Envelope::disconnected(&d));
        assert!(d_rx.recv().await.is_none());
        assert_eq!(hub.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let hub = spawn_hub();
        let (_a, mut a_rx) = join(&hub, "a", 8);
        let (b, _b_rx) = join(&hub, "b", 8);
        let (c, _c_rx) = join(&hub, "c", 8);

        hub.deregister(b.clone()).unwrap();
        hub.deregister(b.clone()).unwrap();
        hub.broadcast(Envelope::from_peer(&c, "after")).unwrap();

        assert_eq!(next(&mut a_rx).await, Envelope::joined()); // b
        assert_eq!(next(&mut a_rx).await, Envelope::joined()); // c
        assert_eq!(next(&mut a_rx).await, Envelope::disconnected(&b));
        assert_eq!(next(&mut a_rx).await, Envelope::from_peer(&c, "after"));
        assert_eq!(hub.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_deregister_unknown_connection_is_noop() {
        let hub = spawn_hub();
        let (a, mut a_rx) = join(&hub, "a", 8);
        let (_b, mut b_rx) = join(&hub, "b", 8);

        hub.deregister(ConnectionId::from("never-registered")).unwrap();
        hub.broadcast(Envelope::from_peer(&a, "ping")).unwrap();

        assert_eq!(next(&mut b_rx).await, Envelope::from_peer(&a, "ping"));
        assert_eq!(next(&mut a_rx).await, Envelope::joined());
        assert_eq!(a_rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(hub.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_full_mailbox_evicted_without_notice() {
        let hub = spawn_hub();
        let (f, _f_rx) = join(&hub, "f", 8);
        let (_g, mut g_rx) = join(&hub, "g", 8);
        let (_e, mut e_rx) = join(&hub, "e", 1);

        hub.broadcast(Envelope::from_peer(&f, "one")).unwrap();
        hub.broadcast(Envelope::from_peer(&f, "two")).unwrap();

        assert_eq!(next(&mut g_rx).await, Envelope::joined()); // e
        assert_eq!(next(&mut g_rx).await, Envelope::from_peer(&f, "one"));
        assert_eq!(next(&mut g_rx).await, Envelope::from_peer(&f, "two"));
        assert_eq!(g_rx.try_recv(), Err(TryRecvError::Empty));

        // e kept the frame it had room for, then was closed
        assert_eq!(next(&mut e_rx).await, Envelope::from_peer(&f, "one"));
        assert!(e_rx.recv().await.is_none());
        assert_eq!(hub.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_evicted_connection_deregister_is_silent() {
        let hub = spawn_hub();
        let (f, _f_rx) = join(&hub, "f", 8);
        let (_g, mut g_rx) = join(&hub, "g", 8);
        let (e, e_rx) = join(&hub, "e", 8);
        drop(e_rx);

        hub.broadcast(Envelope::from_peer(&f, "one")).unwrap();
        hub.deregister(e).unwrap();
        hub.broadcast(Envelope::from_peer(&f, "two")).unwrap();

        assert_eq!(next(&mut g_rx).await, Envelope::joined());
        assert_eq!(next(&mut g_rx).await, Envelope::from_peer(&f, "one"));
        assert_eq!(next(&mut g_rx).await, Envelope::from_peer(&f, "two"));
    }

    #[tokio::test]
    async fn test_stopped_hub_rejects_commands() {
        let (hub, handle) = Hub::new(HubConfig::default());
        drop(hub);

        assert!(!handle.is_running());
        let (conn, _rx) = Connection::new(4);
        assert!(matches!(handle.register(conn), Err(HubError::Stopped)));
    }
}
