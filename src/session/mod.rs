//! Connection/session lifecycle.
//!
//! The [`SessionManager`] owns one record per connection, drives it through
//! [`ConnectionState`], and subscribes the connection's [`PacketSink`] to the
//! broker topics it joins.

pub mod manager;
pub mod sink;
pub mod state;

pub use manager::SessionManager;
pub use sink::PacketSink;
pub use state::{ConnectionState, Session, SessionId, UserIdentity};

pub use crate::utils::SessionError;

#[cfg(test)]
mod tests;
