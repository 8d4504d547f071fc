//! # Switchboard
//!
//! A real-time WebSocket broadcast hub: every message a connected client
//! sends is fanned out to all other connected clients.
//!
//! ## Features
//!
//! - **Serialized coordination**: one control loop owns the set of live
//!   connections, so registry changes never race
//! - **Bounded mailboxes**: each client has a fixed-size outbound queue
//! - **Slow-consumer eviction**: a client that cannot keep up is dropped
//!   instead of stalling everyone else
//! - **JSON envelopes**: `{"sender", "receiver", "content"}` with empty
//!   fields omitted
//!
//! ## Modules
//!
//! - [`websocket`]: Hub, connections, pumps and the upgrade handler
//! - [`api`]: HTTP router and server with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use switchboard::websocket::{Connection, Envelope, Hub, HubConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = Hub::spawn(HubConfig::default());
//!
//!     let (alice, _alice_mailbox) = Connection::new(16);
//!     let (bob, mut bob_mailbox) = Connection::new(16);
//!     let alice_id = alice.id().clone();
//!     hub.register(bob)?;
//!     hub.register(alice)?;
//!
//!     hub.broadcast(Envelope::from_peer(&alice_id, "hello"))?;
//!
//!     // Join notice for alice, then her message
//!     for _ in 0..2 {
//!         if let Some(frame) = bob_mailbox.recv().await {
//!             println!("bob got {}", frame);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod websocket;

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{generate_default_config, Config, ConfigError, LoggingConfig, ServerConfig};

pub use websocket::{
    websocket_handler, Connection, ConnectionId, Envelope, Hub, HubConfig, HubError, HubHandle,
};
