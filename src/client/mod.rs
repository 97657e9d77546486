//! The `client` module covers both ends of a connection.
//!
//! [`Client`] is the server-side handle the session layer writes to;
//! [`ChatClient`] is a small WebSocket client speaking the binary protocol.

pub mod chat;
pub mod connection;

pub use chat::ChatClient;
pub use connection::Client;

#[cfg(test)]
mod tests;
