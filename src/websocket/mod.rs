//! WebSocket Broadcast Hub
//!
//! Every message a client sends is relayed to every other connected client.
//!
//! ## Architecture
//!
//! - **Hub**: single control loop owning the registry of live connections
//! - **Connection**: identity plus a bounded outbound mailbox
//! - **Pumps**: one task reading from the socket, one writing to it
//! - **Handler**: WebSocket upgrade and connection bootstrap
//! - **Messages**: the JSON envelope format
//!
//! A client whose mailbox fills up is evicted without notice so that one
//! stalled reader never holds up delivery to the others.
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:12345/ws');
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   console.log(msg.sender ?? 'system', msg.content);
//! };
//!
//! ws.onopen = () => ws.send('hello everyone');
//! ```

mod connection;
mod handler;
mod hub;
mod messages;
mod pump;
mod registry;

pub use connection::{Connection, ConnectionId, Mailbox};
pub use handler::{handle_socket, websocket_handler};
pub use hub::{Hub, HubConfig, HubError, HubHandle};
pub use messages::{Envelope, Frame, JOIN_NOTICE};
pub use pump::{inbound_pump, outbound_pump};
pub use registry::{FanOut, Registry};
