//! # Chatwire
//!
//! `chatwire` is the messaging substrate of a real-time chat server. Clients
//! speak a binary packet protocol over WebSockets; the server routes every
//! packet through an in-memory topic broker.
//!
//! ## Core Modules
//!
//! - `protocol`: The packet codec. A fixed 218-byte header, CRC32 integrity and
//!   the per-message-type payload layouts.
//! - `broker`: Topic registry that fans published messages out to subscriber callbacks.
//! - `session`: Per-connection state machine, room membership and teardown.
//! - `cache`: Bounded LRU cache used for recently authenticated identities.
//! - `scheduler`: Delayed publication of messages to a topic.
//! - `client`: The server-side connection handle and a small binary-protocol client.
//! - `transport`: The WebSocket server and inbound packet dispatch.
//! - `config`: Layered configuration from defaults, a file and the environment.
//! - `utils`: Error types and logging setup.

pub mod broker;
pub mod cache;
pub mod client;
pub mod config;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod utils;
