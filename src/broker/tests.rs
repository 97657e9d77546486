use std::sync::{Arc, Mutex};

use bytes::Bytes;

use super::topic::{Subscriber, Topic};
use super::*;

type Inbox = Arc<Mutex<Vec<Message>>>;

fn recorder() -> (Inbox, impl Fn(&Message) -> Result<(), DeliveryError> + Send + Sync + 'static) {
    let inbox: Inbox = Arc::default();
    let sink = Arc::clone(&inbox);
    (inbox, move |msg: &Message| {
        sink.lock().unwrap().push(msg.clone());
        Ok(())
    })
}

fn noop(_: &Message) -> Result<(), DeliveryError> {
    Ok(())
}

fn received(inbox: &Inbox) -> usize {
    inbox.lock().unwrap().len()
}

#[test]
fn test_topic_new() {
    let topic = Topic::new("test_topic");
    assert_eq!(topic.name, "test_topic");
    assert!(topic.is_empty());
}

#[test]
fn test_topic_subscribe_replaces_callback() {
    let mut topic = Topic::new("test_topic");
    let first = Subscriber {
        id: "client1".to_string(),
        callback: Arc::new(noop),
    };
    assert!(topic.subscribe(first.clone()));
    assert!(!topic.subscribe(first));
    assert_eq!(topic.len(), 1);
    assert!(topic.contains("client1"));

    assert!(topic.unsubscribe("client1"));
    assert!(!topic.unsubscribe("client1"));
}

#[test]
fn test_topic_helpers() {
    assert_eq!(room_topic("42"), "room:42");
    assert_eq!(user_topic("alice"), "user:alice");
    assert_eq!(room_id_of("room:42"), Some("42"));
    assert_eq!(room_id_of("room:"), None);
    assert_eq!(room_id_of("game:1"), None);
    assert_eq!(user_id_of("user:alice"), Some("alice"));
    assert_eq!(user_id_of("user:"), None);
    assert_eq!(user_id_of("room:alice"), None);
}

#[test]
fn test_subscribe_rejects_empty_identifiers() {
    let broker = Broker::new();
    assert!(!broker.subscribe("", "t", |_| Ok(())));
    assert!(!broker.subscribe("a", "", |_| Ok(())));
    assert_eq!(broker.topic_count(), 0);
}

#[test]
fn test_subscribe_is_idempotent_and_uses_latest_callback() {
    let broker = Broker::new();
    let (old_inbox, old_cb) = recorder();
    let (new_inbox, new_cb) = recorder();

    assert!(broker.subscribe("a", "t", old_cb));
    assert!(broker.subscribe("a", "t", new_cb));
    assert_eq!(broker.subscribers("t"), vec!["a".to_string()]);
    assert_eq!(broker.total_subscriptions(), 1);

    let outcome = broker.publish("t", "m", "");
    assert_eq!(outcome.recipients, 1);
    assert_eq!(received(&old_inbox), 0);
    assert_eq!(received(&new_inbox), 1);
}

#[test]
fn test_publish_suppresses_loopback() {
    let broker = Broker::new();
    let (a_inbox, a_cb) = recorder();
    let (b_inbox, b_cb) = recorder();
    broker.subscribe("a", "t", a_cb);
    broker.subscribe("b", "t", b_cb);

    let outcome = broker.publish("t", "hello", "a");
    assert_eq!(outcome.recipients, 1);
    assert_eq!(received(&a_inbox), 0);
    assert_eq!(received(&b_inbox), 1);

    let msg = &b_inbox.lock().unwrap()[0];
    assert_eq!(msg.topic, "t");
    assert_eq!(msg.sender_id, "a");
    assert_eq!(msg.payload, Bytes::from_static(b"hello"));
}

#[test]
fn test_publish_fans_out_to_every_subscriber() {
    let broker = Broker::new();
    let inboxes: Vec<Inbox> = ["a", "b", "c"]
        .iter()
        .map(|id| {
            let (inbox, cb) = recorder();
            broker.subscribe(id, "t", cb);
            inbox
        })
        .collect();

    let outcome = broker.publish("t", "m", "");
    assert_eq!(outcome.recipients, 3);
    assert_eq!(outcome.delivered, 3);
    assert!(outcome.all_delivered());
    for inbox in &inboxes {
        assert_eq!(received(inbox), 1);
    }
}

#[test]
fn test_wire_frame_is_built_once_per_publish() {
    let broker = Broker::new();
    let encodes = Arc::new(Mutex::new(0usize));
    let frames: Arc<Mutex<Vec<Bytes>>> = Arc::default();
    for id in ["a", "b", "c"] {
        let encodes = Arc::clone(&encodes);
        let frames = Arc::clone(&frames);
        broker.subscribe(id, "t", move |msg: &Message| {
            let frame = msg.wire_frame(|m| {
                *encodes.lock().unwrap() += 1;
                Ok(Bytes::from(format!("framed:{}", String::from_utf8_lossy(&m.payload))))
            })?;
            frames.lock().unwrap().push(frame);
            Ok(())
        });
    }

    broker.publish("t", "m", "");
    assert_eq!(*encodes.lock().unwrap(), 1);
    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| f.as_ref() == b"framed:m"));

    // each publish gets its own frame
    drop(frames);
    broker.publish("t", "n", "");
    assert_eq!(*encodes.lock().unwrap(), 2);
}

#[test]
fn test_wire_frame_error_is_shared() {
    let msg = Message::new("t", "m", "");
    let first = msg.wire_frame(|_| Err(DeliveryError::Rejected("bad".to_string())));
    let second = msg.wire_frame(|m| Ok(m.payload.clone()));
    assert_eq!(first, Err(DeliveryError::Rejected("bad".to_string())));
    assert_eq!(second, first);
}

#[test]
fn test_publish_to_missing_topic_is_noop() {
    let broker = Broker::new();
    assert_eq!(broker.publish("nowhere", "m", "a"), PublishOutcome::default());
}

#[test]
fn test_failing_callbacks_do_not_stop_delivery() {
    let broker = Broker::new();
    let (a_inbox, a_cb) = recorder();
    let (c_inbox, c_cb) = recorder();
    broker.subscribe("a", "t", a_cb);
    broker.subscribe("b", "t", |_| Err(DeliveryError::Closed));
    broker.subscribe("c", "t", c_cb);
    broker.subscribe("d", "t", |_| panic!("subscriber blew up"));

    let outcome = broker.publish("t", "m", "");
    assert_eq!(outcome.recipients, 4);
    assert_eq!(outcome.delivered, 2);
    assert_eq!(outcome.failed, vec!["b".to_string(), "d".to_string()]);
    assert_eq!(received(&a_inbox), 1);
    assert_eq!(received(&c_inbox), 1);

    // the broker is still usable after a callback panicked
    assert!(broker.unsubscribe("d", "t"));
    assert_eq!(broker.subscribers("t").len(), 3);
}

#[test]
fn test_unsubscribe_drops_empty_bookkeeping() {
    let broker = Broker::new();
    broker.subscribe("a", "t1", |_| Ok(()));
    broker.subscribe("a", "t2", |_| Ok(()));

    assert!(broker.unsubscribe("a", "t1"));
    assert_eq!(broker.topic_count(), 1);
    assert_eq!(broker.subscribed_topics("a"), vec!["t2".to_string()]);

    assert!(broker.unsubscribe("a", "t2"));
    assert_eq!(broker.topic_count(), 0);
    assert_eq!(broker.subscriber_count(), 0);
    assert!(broker.subscribed_topics("a").is_empty());

    assert!(!broker.unsubscribe("a", "t2"));
    assert!(!broker.unsubscribe("ghost", "t3"));
}

#[test]
fn test_unsubscribe_all_tears_down_every_topic() {
    let broker = Broker::new();
    let (inbox, cb) = recorder();
    let cb: DeliveryCallback = Arc::new(cb);
    for topic in ["room:1", "room:2", "user:a"] {
        broker.subscribe_callback("a", topic, Arc::clone(&cb));
    }
    broker.subscribe("b", "room:1", |_| Ok(()));

    assert_eq!(broker.unsubscribe_all("a"), 3);
    assert!(broker.subscribed_topics("a").is_empty());
    assert_eq!(broker.topic_count(), 1);

    for topic in ["room:1", "room:2", "user:a"] {
        broker.publish(topic, "m", "");
    }
    assert_eq!(received(&inbox), 0);
    assert_eq!(broker.unsubscribe_all("a"), 0);
}

#[test]
fn test_convenience_wrappers_use_canonical_topics() {
    let broker = Broker::new();
    let (room_inbox, room_cb) = recorder();
    let (user_inbox, user_cb) = recorder();
    let (all_inbox, all_cb) = recorder();
    broker.subscribe("s1", "room:42", room_cb);
    broker.subscribe("s1", "user:alice", user_cb);
    broker.subscribe("s1", BROADCAST_TOPIC, all_cb);

    broker.publish_to_room("42", "r", "");
    broker.publish_to_user("alice", "u", "");
    broker.broadcast("b", "");

    assert_eq!(received(&room_inbox), 1);
    assert_eq!(received(&user_inbox), 1);
    assert_eq!(received(&all_inbox), 1);
}

#[test]
fn test_callback_may_reenter_broker() {
    let broker = Arc::new(Broker::new());
    let inner = Arc::clone(&broker);
    broker.subscribe("a", "t", move |msg| {
        inner.unsubscribe("a", &msg.topic);
        inner.subscribe("a", "t2", |_| Ok(()));
        Ok(())
    });

    let outcome = broker.publish("t", "m", "");
    assert_eq!(outcome.delivered, 1);
    assert_eq!(broker.subscribed_topics("a"), vec!["t2".to_string()]);
}

#[test]
fn test_stats() {
    let broker = Broker::new();
    broker.subscribe("a", "t1", |_| Ok(()));
    broker.subscribe("a", "t2", |_| Ok(()));
    broker.subscribe("b", "t1", |_| Ok(()));

    assert_eq!(
        broker.stats(),
        BrokerStats {
            topics: 2,
            subscribers: 2,
            subscriptions: 3,
        }
    );
    broker.log_stats();
}

#[test]
fn test_end_to_end_room_scenario() {
    let broker = Broker::new();
    let (s1_inbox, s1_cb) = recorder();
    let (s2_inbox, s2_cb) = recorder();
    broker.subscribe("S1", "room:42", s1_cb);
    broker.subscribe("S2", "room:42", s2_cb);

    broker.publish("room:42", r#"{"text":"hi"}"#, "S1");
    assert_eq!(received(&s1_inbox), 0);
    assert_eq!(received(&s2_inbox), 1);
    assert_eq!(s2_inbox.lock().unwrap()[0].payload.as_ref(), br#"{"text":"hi"}"#);

    broker.unsubscribe_all("S1");
    let outcome = broker.publish("room:42", "again", "S2");
    assert_eq!(outcome.recipients, 0);
    assert_eq!(received(&s1_inbox), 0);
    assert_eq!(received(&s2_inbox), 1);
}

#[test]
fn test_concurrent_publish_and_teardown() {
    let broker = Arc::new(Broker::new());
    for i in 0..8 {
        broker.subscribe(&format!("s{i}"), "t", |_| Ok(()));
    }

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let broker = Arc::clone(&broker);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    broker.publish("t", "m", "");
                }
                broker.unsubscribe_all(&format!("s{i}"));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(broker.topic_count(), 0);
    assert_eq!(broker.subscriber_count(), 0);
}
