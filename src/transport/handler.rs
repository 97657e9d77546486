//! Inbound frame dispatch.
//!
//! One call to [`ServerState::handle_frame`] per binary WebSocket message.
//! Frames that fail framing checks are logged and dropped, and unknown types
//! are ignored. Everything except login, heartbeat and logout requires an
//! authenticated session; a violation gets an error reply and the connection
//! is closed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use serde_json::json;
use tracing::{debug, info, warn};

use super::auth::Authenticator;
use crate::broker::{BROADCAST_TOPIC, Broker, room_id_of, user_id_of, user_topic};
use crate::config::Settings;
use crate::protocol::payload::{Ack, ErrorReport, LoginResponse};
use crate::protocol::{self, FixedString, Id, MessageType, Packet, PacketFlags, PacketHeader, TypedPayload};
use crate::scheduler::Scheduler;
use crate::session::SessionManager;
use crate::utils::{CacheError, ProtocolError};

const SERVER_SENDER: &str = "server";

const ERR_BAD_REQUEST: u32 = 400;
const ERR_UNAUTHENTICATED: u32 = 401;
const ERR_FORBIDDEN: u32 = 403;

/// What the connection should do after a frame was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Shared state of a running server.
pub struct ServerState {
    pub broker: Arc<Broker>,
    pub sessions: Arc<SessionManager>,
    /// Delayed publication into the same broker. No inbound message type schedules;
    /// embedding code calls [`Scheduler::schedule`] and the server binary drives the tick loop.
    pub scheduler: Arc<Scheduler>,
    pub authenticator: Arc<dyn Authenticator>,
    pub max_payload_len: usize,
    pub max_frame_len: usize,
    pub max_connections: usize,
    connections: AtomicUsize,
}

/// Holds one connection slot until dropped.
pub struct ConnectionSlot {
    state: Arc<ServerState>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.state.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ServerState {
    pub fn new(settings: &Settings, authenticator: Arc<dyn Authenticator>) -> Result<Self, CacheError> {
        let broker = Arc::new(Broker::new());
        let sessions = SessionManager::new(Arc::clone(&broker), settings.session.identity_cache_capacity)?;
        Ok(Self {
            scheduler: Arc::new(Scheduler::new(Arc::clone(&broker))),
            sessions: Arc::new(sessions),
            broker,
            authenticator,
            max_payload_len: settings.protocol.max_payload_len,
            max_frame_len: settings.max_frame_len(),
            max_connections: settings.server.max_connections,
            connections: AtomicUsize::new(0),
        })
    }

    /// Claims a connection slot, or `None` when `max_connections` are open.
    pub fn try_reserve_connection(self: &Arc<Self>) -> Option<ConnectionSlot> {
        self.connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |open| {
                (open < self.max_connections).then_some(open + 1)
            })
            .ok()
            .map(|_| ConnectionSlot {
                state: Arc::clone(self),
            })
    }

    pub fn open_connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn handle_frame(&self, session_id: &str, frame: Bytes) -> Flow {
        let packet = match protocol::decode_with_limit(frame.clone(), self.max_payload_len) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(session = session_id, error = %e, "dropping malformed frame");
                return Flow::Continue;
            }
        };
        let kind = match packet.kind() {
            Ok(kind) => kind,
            Err(e) => {
                debug!(session = session_id, error = %e, "ignoring frame");
                return Flow::Continue;
            }
        };

        let flow = match kind {
            MessageType::LoginRequest => self.handle_login(session_id, &packet),
            MessageType::Heartbeat | MessageType::Ping => {
                self.reply(session_id, &packet, MessageType::Pong, &TypedPayload::Empty);
                Flow::Continue
            }
            MessageType::Logout => {
                self.sessions.disconnect(session_id);
                return Flow::Close;
            }
            _ if !self.sessions.state(session_id).is_authenticated() => {
                warn!(session = session_id, ?kind, "request before authentication");
                self.reply_error(session_id, &packet, ERR_UNAUTHENTICATED, "authentication required");
                return Flow::Close;
            }
            MessageType::JoinRoom | MessageType::LeaveRoom => self.handle_room(session_id, &packet, kind),
            MessageType::Subscribe | MessageType::Unsubscribe => self.handle_subscription(session_id, &packet, kind),
            _ if kind.is_topic_traffic() => self.relay(session_id, packet.clone(), frame),
            _ => {
                debug!(session = session_id, ?kind, "no handler for message type");
                Flow::Continue
            }
        };

        let acked_inline = matches!(
            kind,
            MessageType::JoinRoom | MessageType::LeaveRoom | MessageType::Subscribe | MessageType::Unsubscribe
        );
        if flow == Flow::Continue && !acked_inline && packet.header.flags.contains(PacketFlags::REQUIRE_ACK) {
            self.ack(session_id, &packet, MessageType::Ack, true);
        }
        flow
    }

    fn handle_login(&self, session_id: &str, packet: &Packet) -> Flow {
        let request = match packet.interpret() {
            Ok(TypedPayload::Login(request)) => request,
            Ok(_) | Err(_) => {
                self.reply_error(session_id, packet, ERR_BAD_REQUEST, "malformed login request");
                return Flow::Continue;
            }
        };

        let username = request.username.as_str();
        let Some(identity) = self.authenticator.authenticate(username, request.password_hash.as_str()) else {
            info!(session = session_id, username, "login rejected");
            self.reply_login(session_id, packet, None, "invalid credentials");
            return Flow::Continue;
        };

        if let Err(e) = self.sessions.authenticate(session_id, identity.clone()) {
            warn!(session = session_id, error = %e, "login in wrong state");
            self.reply_login(session_id, packet, None, "already authenticated");
            return Flow::Continue;
        }
        for topic in [user_topic(&identity.user_id), BROADCAST_TOPIC.to_string()] {
            if let Err(e) = self.sessions.subscribe_topic(session_id, &topic) {
                warn!(session = session_id, error = %e, "login subscription failed");
            }
        }

        self.reply_login(session_id, packet, Some(&identity.user_id), "");
        Flow::Continue
    }

    fn handle_room(&self, session_id: &str, packet: &Packet, kind: MessageType) -> Flow {
        let room_id = match packet.interpret() {
            Ok(TypedPayload::Room(request)) if !request.room_id.is_empty() => request.room_id.to_string(),
            _ => {
                self.reply_error(session_id, packet, ERR_BAD_REQUEST, "malformed room request");
                return Flow::Continue;
            }
        };
        let ok = self.change_membership(session_id, &room_id, kind == MessageType::JoinRoom);
        self.ack(session_id, packet, MessageType::Ack, ok);
        Flow::Continue
    }

    /// `room:` topics are joins and leaves. A `user:` topic may only be the caller's own.
    fn handle_subscription(&self, session_id: &str, packet: &Packet, kind: MessageType) -> Flow {
        let topic = packet.header.topic.as_str();
        let subscribe = kind == MessageType::Subscribe;
        let reply = if subscribe { MessageType::SubAck } else { MessageType::UnsubAck };

        let ok = if let Some(room_id) = room_id_of(topic) {
            self.change_membership(session_id, room_id, subscribe)
        } else if subscribe {
            match user_id_of(topic) {
                Some(owner) if Some(owner) != self.user_id(session_id).as_deref() => {
                    warn!(session = session_id, topic, "refusing another user's topic");
                    false
                }
                _ => self.sessions.subscribe_topic(session_id, topic).is_ok(),
            }
        } else {
            self.sessions.unsubscribe_topic(session_id, topic).unwrap_or(false)
        };
        self.ack(session_id, packet, reply, ok);
        Flow::Continue
    }

    /// Joins or leaves `room_id` and tells the other members. Returns whether anything changed.
    fn change_membership(&self, session_id: &str, room_id: &str, join: bool) -> bool {
        let (event, ok) = if join {
            ("member_joined", self.sessions.join_room(session_id, room_id).is_ok())
        } else {
            ("member_left", self.sessions.leave_room(session_id, room_id).unwrap_or(false))
        };

        if ok {
            let notice = json!({
                "type": event,
                "room_id": room_id,
                "user_id": self.user_id(session_id).unwrap_or_default(),
                "session_id": session_id,
            });
            self.broker.publish_to_room(room_id, notice.to_string(), session_id);
        }
        ok
    }

    fn user_id(&self, session_id: &str) -> Option<String> {
        self.sessions
            .session(session_id)
            .and_then(|s| s.user_id().map(str::to_string))
    }

    /// Forwards the frame to its header topic with the session as sender.
    ///
    /// The sender field is rewritten to the authenticated user id when the
    /// client put anything else there.
    fn relay(&self, session_id: &str, packet: Packet, frame: Bytes) -> Flow {
        let topic = packet.header.topic.to_string();
        if topic.is_empty() {
            self.reply_error(session_id, &packet, ERR_BAD_REQUEST, "missing topic");
            return Flow::Continue;
        }
        if let Some(room_id) = room_id_of(&topic) {
            if !self.sessions.is_member(session_id, room_id) {
                self.reply_error(session_id, &packet, ERR_FORBIDDEN, "not a member of this room");
                return Flow::Continue;
            }
        }

        let user_id = self.user_id(session_id).unwrap_or_default();
        let frame = if packet.header.sender.as_str() == user_id {
            frame
        } else {
            match restamp(packet, &user_id) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(session = session_id, error = %e, "cannot re-encode relayed frame");
                    return Flow::Continue;
                }
            }
        };

        let outcome = self.broker.publish(&topic, frame, session_id);
        debug!(
            session = session_id,
            topic = %topic,
            recipients = outcome.recipients,
            failed = outcome.failed.len(),
            "relayed"
        );
        Flow::Continue
    }

    fn reply(&self, session_id: &str, request: &Packet, kind: MessageType, body: &TypedPayload) {
        let result = PacketHeader::new(kind, SERVER_SENDER, request.header.topic.as_str())
            .map(|h| h.with_message_id(request.header.message_id))
            .and_then(|h| Packet::from_payload(h, body));
        match result {
            Ok(packet) => {
                if let Err(e) = self.sessions.send_packet(session_id, &packet) {
                    debug!(session = session_id, error = %e, "reply not delivered");
                }
            }
            Err(e) => warn!(session = session_id, error = %e, "failed to build reply"),
        }
    }

    fn ack(&self, session_id: &str, request: &Packet, kind: MessageType, success: bool) {
        let body = TypedPayload::Ack(Ack {
            acked_message_id: request.header.message_id,
            success,
        });
        self.reply(session_id, request, kind, &body);
    }

    fn reply_error(&self, session_id: &str, request: &Packet, code: u32, message: &str) {
        self.reply(
            session_id,
            request,
            MessageType::Error,
            &TypedPayload::Error(ErrorReport::new(code, message)),
        );
    }

    fn reply_login(&self, session_id: &str, request: &Packet, user_id: Option<&str>, error: &str) {
        let body = login_response(session_id, user_id, error);
        match body {
            Ok(body) => self.reply(session_id, request, MessageType::LoginResponse, &TypedPayload::LoginResponse(body)),
            Err(e) => warn!(session = session_id, error = %e, "failed to build login response"),
        }
    }
}

fn login_response(session_id: &str, user_id: Option<&str>, error: &str) -> Result<LoginResponse, ProtocolError> {
    Ok(LoginResponse {
        success: user_id.is_some(),
        token: if user_id.is_some() {
            FixedString::new(session_id)?
        } else {
            FixedString::default()
        },
        user_id: Id::new(user_id.unwrap_or_default())?,
        error_message: FixedString::new(error)?,
    })
}

fn restamp(packet: Packet, user_id: &str) -> Result<Bytes, ProtocolError> {
    let mut header = packet.header;
    header.sender = Id::new(user_id)?;
    protocol::encode(&header, &packet.payload)
}
