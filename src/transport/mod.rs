//! The `transport` module is responsible for handling network communication
//! with clients over WebSockets.
//!
//! Each binary message carries one encoded packet. [`handler`] decodes it and
//! dispatches to the session manager and broker; [`websocket`] owns the
//! listener, the per-connection reader and writer tasks, and teardown.

pub mod auth;
pub mod handler;
pub mod websocket;

pub use auth::{Authenticator, StaticCredentials};
pub use handler::{ConnectionSlot, Flow, ServerState};
pub use websocket::{serve, start_websocket_server};
