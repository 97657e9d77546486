use std::collections::BTreeSet;

/// Connection lifecycle.
///
/// `Connecting -> Connected -> Authenticated`, and any state may drop to the
/// terminal `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Authenticated,
}

impl ConnectionState {
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Connected) | (Connected, Authenticated) | (Connecting | Connected | Authenticated, Disconnected)
        )
    }

    pub fn is_authenticated(self) -> bool {
        self == ConnectionState::Authenticated
    }
}

pub type SessionId = String;

/// Identity recorded once an external check accepted the connection's credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: String,
    pub username: String,
}

/// Snapshot of one session's record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: SessionId,
    pub state: ConnectionState,
    pub identity: Option<UserIdentity>,
    /// Room ids the session is subscribed to.
    pub rooms: BTreeSet<String>,
    /// Most recently joined room still held.
    pub current_room: Option<String>,
    /// Non-room topics (`user:<id>`, broadcast, `<domain>:<id>`).
    pub topics: BTreeSet<String>,
    pub connected_at: i64,
}

impl Session {
    pub(crate) fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            state: ConnectionState::Connecting,
            identity: None,
            rooms: BTreeSet::new(),
            current_room: None,
            topics: BTreeSet::new(),
            connected_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.user_id.as_str())
    }

    pub fn username(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.username.as_str())
    }
}
