//! Per-connection state and its bindings to the broker.
//!
//! Lock order is always `sessions` then the broker's registry. Every
//! subscription change for a session happens while its record is held, so a
//! concurrent `disconnect` either runs first (and the join fails with
//! `UnknownSession`) or runs after and tears the new subscription down.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::{debug, info};
use uuid::Uuid;

use super::sink::PacketSink;
use super::state::{ConnectionState, Session, SessionId, UserIdentity};
use crate::broker::{Broker, Message, room_id_of, room_topic};
use crate::cache::LruCache;
use crate::protocol::{self, MessageType, Packet, PacketHeader};
use crate::utils::{CacheError, DeliveryError, SessionError};

struct SessionEntry {
    record: Session,
    sink: Arc<dyn PacketSink>,
}

pub struct SessionManager {
    broker: Arc<Broker>,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    identities: LruCache<String, UserIdentity>,
}

impl SessionManager {
    pub fn new(broker: Arc<Broker>, identity_cache_capacity: usize) -> Result<Self, CacheError> {
        Ok(Self {
            broker,
            sessions: Mutex::new(HashMap::new()),
            identities: LruCache::new(identity_cache_capacity)?,
        })
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Registers a new connection in `Connecting` and returns its fresh id.
    pub fn accept(&self, sink: Arc<dyn PacketSink>) -> SessionId {
        let session_id = Uuid::new_v4().to_string();
        self.sessions().insert(
            session_id.clone(),
            SessionEntry {
                record: Session::new(session_id.clone()),
                sink,
            },
        );
        debug!(session = %session_id, "connection accepted");
        session_id
    }

    /// The transport finished its handshake.
    pub fn mark_connected(&self, session_id: &str) -> Result<(), SessionError> {
        self.transition(session_id, ConnectionState::Connected)?;
        debug!(session = session_id, "connected");
        Ok(())
    }

    /// Records a successful credential check made elsewhere.
    pub fn authenticate(&self, session_id: &str, identity: UserIdentity) -> Result<(), SessionError> {
        let mut sessions = self.sessions();
        let entry = lookup(&mut sessions, session_id)?;
        check_transition(entry.record.state, ConnectionState::Authenticated)?;

        entry.record.state = ConnectionState::Authenticated;
        entry.record.identity = Some(identity.clone());
        info!(session = session_id, user = %identity.user_id, "authenticated");
        self.identities.put(identity.user_id.clone(), identity);
        Ok(())
    }

    /// Subscribes the session to `room:<room_id>` and makes it the current room.
    ///
    /// Whether joining requires authentication is the caller's policy.
    pub fn join_room(&self, session_id: &str, room_id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions();
        let entry = lookup(&mut sessions, session_id)?;
        let topic = room_topic(room_id);
        if !self.broker.subscribe(session_id, &topic, outbound(Arc::clone(&entry.sink))) {
            return Err(SessionError::Subscription(topic));
        }

        entry.record.rooms.insert(room_id.to_string());
        entry.record.current_room = Some(room_id.to_string());
        debug!(session = session_id, room = room_id, "joined room");
        Ok(())
    }

    /// Returns whether the session was in the room.
    pub fn leave_room(&self, session_id: &str, room_id: &str) -> Result<bool, SessionError> {
        let mut sessions = self.sessions();
        let entry = lookup(&mut sessions, session_id)?;
        self.broker.unsubscribe(session_id, &room_topic(room_id));

        let was_member = entry.record.rooms.remove(room_id);
        if entry.record.current_room.as_deref() == Some(room_id) {
            entry.record.current_room = None;
        }
        if was_member {
            debug!(session = session_id, room = room_id, "left room");
        }
        Ok(was_member)
    }

    /// Subscribes to a topic such as `user:<id>` or the broadcast topic.
    ///
    /// A `room:<id>` topic is a room join, with the same bookkeeping as
    /// [`join_room`](Self::join_room).
    pub fn subscribe_topic(&self, session_id: &str, topic: &str) -> Result<(), SessionError> {
        if let Some(room_id) = room_id_of(topic) {
            return self.join_room(session_id, room_id);
        }
        let mut sessions = self.sessions();
        let entry = lookup(&mut sessions, session_id)?;
        if !self.broker.subscribe(session_id, topic, outbound(Arc::clone(&entry.sink))) {
            return Err(SessionError::Subscription(topic.to_string()));
        }
        entry.record.topics.insert(topic.to_string());
        Ok(())
    }

    /// Returns whether the session was subscribed. A `room:<id>` topic leaves the room.
    pub fn unsubscribe_topic(&self, session_id: &str, topic: &str) -> Result<bool, SessionError> {
        if let Some(room_id) = room_id_of(topic) {
            return self.leave_room(session_id, room_id);
        }
        let mut sessions = self.sessions();
        let entry = lookup(&mut sessions, session_id)?;
        self.broker.unsubscribe(session_id, topic);
        Ok(entry.record.topics.remove(topic))
    }

    /// Tears the session down from whatever state it is in.
    ///
    /// Every broker subscription is removed before the record is discarded.
    /// Returns `false` if the session was already gone.
    pub fn disconnect(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions();
        let Some(entry) = sessions.remove(session_id) else {
            return false;
        };
        let topics = self.broker.unsubscribe_all(session_id);
        info!(
            session = session_id,
            user = entry.record.user_id().unwrap_or("-"),
            from = ?entry.record.state,
            topics,
            "disconnected"
        );
        true
    }

    /// Current state; unknown sessions report `Disconnected`.
    pub fn state(&self, session_id: &str) -> ConnectionState {
        self.sessions()
            .get(session_id)
            .map_or(ConnectionState::Disconnected, |e| e.record.state)
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions().get(session_id).map(|e| e.record.clone())
    }

    pub fn is_member(&self, session_id: &str, room_id: &str) -> bool {
        self.sessions()
            .get(session_id)
            .is_some_and(|e| e.record.rooms.contains(room_id))
    }

    /// Writes an already encoded frame to one session.
    pub fn send_to(&self, session_id: &str, frame: Bytes) -> Result<(), DeliveryError> {
        let sink = self
            .sessions()
            .get(session_id)
            .map(|e| Arc::clone(&e.sink))
            .ok_or(DeliveryError::Closed)?;
        sink.send(frame)
    }

    pub fn send_packet(&self, session_id: &str, packet: &Packet) -> Result<(), DeliveryError> {
        self.send_to(session_id, packet.encode()?)
    }

    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    /// Identity cached at authentication time, if still resident.
    pub fn cached_identity(&self, user_id: &str) -> Option<UserIdentity> {
        self.identities.get(&user_id.to_string())
    }

    fn transition(&self, session_id: &str, next: ConnectionState) -> Result<(), SessionError> {
        let mut sessions = self.sessions();
        let entry = lookup(&mut sessions, session_id)?;
        check_transition(entry.record.state, next)?;
        entry.record.state = next;
        Ok(())
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lookup<'a>(
    sessions: &'a mut HashMap<SessionId, SessionEntry>,
    session_id: &str,
) -> Result<&'a mut SessionEntry, SessionError> {
    sessions
        .get_mut(session_id)
        .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))
}

fn check_transition(from: ConnectionState, to: ConnectionState) -> Result<(), SessionError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(SessionError::InvalidTransition { from, to })
    }
}

/// Broker callback writing to `sink`.
fn outbound(sink: Arc<dyn PacketSink>) -> impl Fn(&Message) -> Result<(), DeliveryError> + Send + Sync + 'static {
    move |msg: &Message| sink.send(msg.wire_frame(encode_outbound)?)
}

/// Payloads that already are complete frames go out untouched; anything else
/// is wrapped in a `Publish` packet addressed to the message's topic.
fn encode_outbound(msg: &Message) -> Result<Bytes, DeliveryError> {
    if protocol::decode(msg.payload.clone()).is_ok() {
        return Ok(msg.payload.clone());
    }
    let header = PacketHeader::new(MessageType::Publish, &msg.sender_id, &msg.topic)?;
    Ok(protocol::encode(&header, &msg.payload)?)
}
