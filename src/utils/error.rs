//! The `error` module defines the error types used across `chatwire`.
//!
//! Each subsystem owns one enum here and re-exports it from its own module,
//! so callers can write `protocol::ProtocolError` or `broker::DeliveryError`.
//! None of these are fatal to the process: framing and delivery errors are
//! logged and skipped by the caller, bookkeeping failures come back as plain
//! booleans, and only constructor misconfiguration surfaces as a hard error.

use thiserror::Error;

use crate::protocol::MessageType;
use crate::session::ConnectionState;

/// Failures raised by the packet codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("truncated packet: need={need} have={have}")]
    Truncated { need: usize, have: usize },

    #[error("checksum mismatch: expected={expected:#010x} computed={computed:#010x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown message type {0}")]
    UnknownMessageType(u32),

    #[error("{extra} bytes trail the declared payload")]
    TrailingBytes { extra: usize },

    #[error("field exceeds fixed width: len={len} max={max}")]
    FieldTooLong { len: usize, max: usize },

    #[error("fixed-width field contains a NUL byte")]
    EmbeddedNul,

    #[error("field `{field}` is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("field `{field}` has non-NUL bytes in its padding")]
    DirtyPadding { field: &'static str },

    #[error("payload exceeds maximum size: len={len} max={max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("malformed {kind:?} payload: {reason}")]
    MalformedPayload {
        kind: MessageType,
        reason: &'static str,
    },
}

impl ProtocolError {
    /// Frame-level failures: the bytes cannot be trusted as a packet at all.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. }
                | Self::ChecksumMismatch { .. }
                | Self::UnsupportedVersion(_)
                | Self::TrailingBytes { .. }
                | Self::PayloadTooLarge { .. }
        )
    }
}

/// Failure of a single subscriber's delivery callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,

    #[error("failed to encode outbound packet: {0}")]
    Encoding(#[from] ProtocolError),

    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("delivery callback panicked")]
    Panicked,
}

/// Errors reported by the session manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("unknown session {0}")]
    UnknownSession(String),

    #[error("invalid transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    #[error("broker refused subscription to `{0}`")]
    Subscription(String),
}

/// Constructor-time misconfiguration of a bounded cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache capacity must be at least 1")]
    ZeroCapacity,
}

/// Errors from the delayed-publish scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("scheduled message {0} not found")]
    NotFound(String),

    #[error("scheduled message {0} belongs to another owner")]
    NotOwner(String),

    #[error("invalid delay `{0}`, expected <number><s|m|h|d>")]
    InvalidDelay(String),

    #[error("scheduled message is empty")]
    EmptyMessage,
}

/// Top-level failures of the server binary.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Failures of the WebSocket chat client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("connection closed by server")]
    Closed,

    #[error("unexpected reply: {0}")]
    Unexpected(String),
}
