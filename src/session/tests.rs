use std::sync::{Arc, Mutex};

use bytes::Bytes;

use super::*;
use crate::broker::Broker;
use crate::protocol::{self, MessageType, Packet, PacketHeader};
use crate::utils::DeliveryError;

#[derive(Default)]
struct RecordingSink {
    frames: Mutex<Vec<Bytes>>,
}

impl RecordingSink {
    fn frames(&self) -> Vec<Bytes> {
        self.frames.lock().unwrap().clone()
    }
}

impl PacketSink for RecordingSink {
    fn send(&self, frame: Bytes) -> Result<(), DeliveryError> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}

struct ClosedSink;

impl PacketSink for ClosedSink {
    fn send(&self, _frame: Bytes) -> Result<(), DeliveryError> {
        Err(DeliveryError::Closed)
    }
}

fn manager() -> (Arc<Broker>, SessionManager) {
    let broker = Arc::new(Broker::new());
    let manager = SessionManager::new(Arc::clone(&broker), 8).unwrap();
    (broker, manager)
}

fn identity(user: &str) -> UserIdentity {
    UserIdentity {
        user_id: user.to_string(),
        username: user.to_uppercase(),
    }
}

fn connect(manager: &SessionManager) -> (SessionId, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let id = manager.accept(sink.clone());
    manager.mark_connected(&id).unwrap();
    (id, sink)
}

#[test]
fn test_state_transitions() {
    use ConnectionState::*;
    assert!(Connecting.can_transition_to(Connected));
    assert!(Connected.can_transition_to(Authenticated));
    assert!(Authenticated.can_transition_to(Disconnected));
    assert!(Connecting.can_transition_to(Disconnected));
    assert!(!Connecting.can_transition_to(Authenticated));
    assert!(!Authenticated.can_transition_to(Connected));
    assert!(!Disconnected.can_transition_to(Connecting));
}

#[test]
fn test_accept_starts_connecting() {
    let (_, manager) = manager();
    let id = manager.accept(Arc::new(RecordingSink::default()));
    assert_eq!(manager.state(&id), ConnectionState::Connecting);

    let other = manager.accept(Arc::new(RecordingSink::default()));
    assert_ne!(id, other);
    assert_eq!(manager.session_count(), 2);
}

#[test]
fn test_authenticate_requires_connected() {
    let (_, manager) = manager();
    let id = manager.accept(Arc::new(RecordingSink::default()));

    let err = manager.authenticate(&id, identity("alice")).unwrap_err();
    assert_eq!(
        err,
        SessionError::InvalidTransition {
            from: ConnectionState::Connecting,
            to: ConnectionState::Authenticated,
        }
    );

    manager.mark_connected(&id).unwrap();
    manager.authenticate(&id, identity("alice")).unwrap();
    assert_eq!(manager.state(&id), ConnectionState::Authenticated);

    let session = manager.session(&id).unwrap();
    assert_eq!(session.user_id(), Some("alice"));
    assert_eq!(session.username(), Some("ALICE"));
    assert_eq!(manager.cached_identity("alice"), Some(identity("alice")));
}

#[test]
fn test_unknown_session() {
    let (_, manager) = manager();
    assert_eq!(manager.state("ghost"), ConnectionState::Disconnected);
    assert_eq!(
        manager.join_room("ghost", "1").unwrap_err(),
        SessionError::UnknownSession("ghost".to_string())
    );
    assert!(!manager.disconnect("ghost"));
    assert_eq!(manager.send_to("ghost", Bytes::new()).unwrap_err(), DeliveryError::Closed);
}

#[test]
fn test_join_and_leave_room() {
    let (broker, manager) = manager();
    let (id, _) = connect(&manager);

    manager.join_room(&id, "1").unwrap();
    manager.join_room(&id, "2").unwrap();
    let session = manager.session(&id).unwrap();
    assert_eq!(session.current_room.as_deref(), Some("2"));
    assert_eq!(session.rooms.len(), 2);
    assert!(manager.is_member(&id, "1"));
    assert_eq!(broker.subscribed_topics(&id), vec!["room:1".to_string(), "room:2".to_string()]);

    assert!(manager.leave_room(&id, "2").unwrap());
    assert!(!manager.leave_room(&id, "2").unwrap());
    let session = manager.session(&id).unwrap();
    assert_eq!(session.current_room, None);
    assert!(!manager.is_member(&id, "2"));
    assert_eq!(broker.subscribed_topics(&id), vec!["room:1".to_string()]);
}

#[test]
fn test_empty_topic_is_refused() {
    let (_, manager) = manager();
    let (id, _) = connect(&manager);
    assert_eq!(
        manager.subscribe_topic(&id, "").unwrap_err(),
        SessionError::Subscription(String::new())
    );
}

#[test]
fn test_subscribe_topic() {
    let (broker, manager) = manager();
    let (id, sink) = connect(&manager);

    manager.subscribe_topic(&id, "user:alice").unwrap();
    broker.publish_to_user("alice", "direct", "");
    assert_eq!(sink.frames().len(), 1);

    assert!(manager.unsubscribe_topic(&id, "user:alice").unwrap());
    assert!(!manager.unsubscribe_topic(&id, "user:alice").unwrap());
    broker.publish_to_user("alice", "direct", "");
    assert_eq!(sink.frames().len(), 1);
}

#[test]
fn test_room_topics_go_through_membership() {
    let (broker, manager) = manager();
    let (id, _) = connect(&manager);

    manager.subscribe_topic(&id, "room:7").unwrap();
    let session = manager.session(&id).unwrap();
    assert!(manager.is_member(&id, "7"));
    assert_eq!(session.current_room.as_deref(), Some("7"));
    assert!(session.topics.is_empty());

    assert!(manager.unsubscribe_topic(&id, "room:7").unwrap());
    let session = manager.session(&id).unwrap();
    assert!(!manager.is_member(&id, "7"));
    assert_eq!(session.current_room, None);
    assert!(!broker.is_subscribed(&id, "room:7"));
    assert!(!manager.unsubscribe_topic(&id, "room:7").unwrap());
}

#[test]
fn test_raw_payload_is_wrapped_in_publish_packet() {
    let (broker, manager) = manager();
    let (s1, _) = connect(&manager);
    let (s2, sink2) = connect(&manager);
    manager.join_room(&s1, "42").unwrap();
    manager.join_room(&s2, "42").unwrap();

    broker.publish_to_room("42", r#"{"text":"hi"}"#, &s1);

    let frames = sink2.frames();
    assert_eq!(frames.len(), 1);
    let packet = protocol::decode(frames[0].clone()).unwrap();
    assert_eq!(packet.kind().unwrap(), MessageType::Publish);
    assert_eq!(packet.header.topic.as_str(), "room:42");
    assert_eq!(packet.header.sender.as_str(), s1);
    assert_eq!(packet.payload.as_ref(), br#"{"text":"hi"}"#);
}

#[test]
fn test_room_fan_out_shares_one_encoded_frame() {
    let (broker, manager) = manager();
    let (sender, _) = connect(&manager);
    manager.join_room(&sender, "42").unwrap();
    let sinks: Vec<_> = (0..3)
        .map(|_| {
            let (id, sink) = connect(&manager);
            manager.join_room(&id, "42").unwrap();
            sink
        })
        .collect();

    broker.publish_to_room("42", "raw", &sender);

    let first = sinks[0].frames()[0].clone();
    for sink in &sinks {
        let frames = sink.frames();
        assert_eq!(frames.len(), 1);
        // same buffer, not just equal bytes
        assert_eq!(frames[0].as_ptr(), first.as_ptr());
    }
}

#[test]
fn test_encoded_frames_pass_through_unchanged() {
    let (broker, manager) = manager();
    let (s1, sink1) = connect(&manager);
    let (s2, sink2) = connect(&manager);
    manager.join_room(&s1, "42").unwrap();
    manager.join_room(&s2, "42").unwrap();

    let header = PacketHeader::new(MessageType::ChatText, "alice", "room:42").unwrap();
    let frame = Packet::new(header, "opaque").unwrap().encode().unwrap();
    broker.publish("room:42", frame.clone(), &s1);

    assert!(sink1.frames().is_empty());
    assert_eq!(sink2.frames(), vec![frame]);
}

#[test]
fn test_closed_sink_is_a_delivery_failure() {
    let (broker, manager) = manager();
    let closed = manager.accept(Arc::new(ClosedSink));
    let (open, sink) = connect(&manager);
    manager.join_room(&closed, "1").unwrap();
    manager.join_room(&open, "1").unwrap();

    let outcome = broker.publish_to_room("1", "m", "");
    assert_eq!(outcome.failed, vec![closed]);
    assert_eq!(outcome.delivered, 1);
    assert_eq!(sink.frames().len(), 1);
}

#[test]
fn test_disconnect_tears_down_subscriptions() {
    let (broker, manager) = manager();
    let (s1, sink1) = connect(&manager);
    let (s2, sink2) = connect(&manager);
    manager.authenticate(&s1, identity("alice")).unwrap();
    manager.join_room(&s1, "42").unwrap();
    manager.subscribe_topic(&s1, "user:alice").unwrap();
    manager.join_room(&s2, "42").unwrap();

    broker.publish_to_room("42", "hi", &s1);
    assert_eq!(sink2.frames().len(), 1);

    assert!(manager.disconnect(&s1));
    assert!(!manager.disconnect(&s1));
    assert_eq!(manager.state(&s1), ConnectionState::Disconnected);
    assert!(broker.subscribed_topics(&s1).is_empty());
    assert_eq!(manager.session_count(), 1);

    let outcome = broker.publish_to_room("42", "again", &s2);
    assert_eq!(outcome.recipients, 0);
    broker.publish_to_user("alice", "direct", "");
    assert!(sink1.frames().is_empty());
}

#[test]
fn test_disconnect_from_connecting() {
    let (broker, manager) = manager();
    let id = manager.accept(Arc::new(RecordingSink::default()));
    manager.join_room(&id, "1").unwrap();
    assert!(manager.disconnect(&id));
    assert_eq!(broker.topic_count(), 0);
}

#[test]
fn test_send_packet() {
    let (_, manager) = manager();
    let (id, sink) = connect(&manager);
    let header = PacketHeader::new(MessageType::Pong, "server", "").unwrap();
    let packet = Packet::new(header, Bytes::new()).unwrap();

    manager.send_packet(&id, &packet).unwrap();
    let frames = sink.frames();
    assert_eq!(protocol::decode(frames[0].clone()).unwrap(), packet);
}

#[test]
fn test_identity_cache_is_bounded() {
    let broker = Arc::new(Broker::new());
    let manager = SessionManager::new(broker, 1).unwrap();
    for user in ["alice", "bob"] {
        let (id, _) = connect(&manager);
        manager.authenticate(&id, identity(user)).unwrap();
    }
    assert_eq!(manager.cached_identity("alice"), None);
    assert!(manager.cached_identity("bob").is_some());

    assert!(SessionManager::new(Arc::new(Broker::new()), 0).is_err());
}
