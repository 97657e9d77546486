use std::fmt;

use super::message::DeliveryCallback;

pub type SubscriberId = String;

/// Topic every connection joins at login; [`Broker::broadcast`] publishes here.
///
/// [`Broker::broadcast`]: super::Broker::broadcast
pub const BROADCAST_TOPIC: &str = "broadcast";

const ROOM_PREFIX: &str = "room:";
const USER_PREFIX: &str = "user:";

/// Canonical topic for a chat room.
pub fn room_topic(room_id: &str) -> String {
    format!("{ROOM_PREFIX}{room_id}")
}

/// Canonical topic for direct delivery to one user.
pub fn user_topic(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Room id of a `room:<id>` topic.
pub fn room_id_of(topic: &str) -> Option<&str> {
    topic.strip_prefix(ROOM_PREFIX).filter(|id| !id.is_empty())
}

/// User id of a `user:<id>` topic.
pub fn user_id_of(topic: &str) -> Option<&str> {
    topic.strip_prefix(USER_PREFIX).filter(|id| !id.is_empty())
}

/// One `(subscriber id, callback)` registration under a topic.
#[derive(Clone)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub callback: DeliveryCallback,
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Represents a topic in the broker system
/// Holds at most one entry per subscriber id, in subscription order
/// The broker drops a topic as soon as its last subscriber leaves
#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub subscribers: Vec<Subscriber>,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: Vec::new(),
        }
    }

    /// Adds the subscriber, or replaces the callback of an existing entry with the same id
    /// Returns true when a new entry was added
    pub fn subscribe(&mut self, subscriber: Subscriber) -> bool {
        match self.subscribers.iter_mut().find(|s| s.id == subscriber.id) {
            Some(existing) => {
                existing.callback = subscriber.callback;
                false
            }
            None => {
                self.subscribers.push(subscriber);
                true
            }
        }
    }

    /// Removes the subscriber's entry, returning whether one existed
    pub fn unsubscribe(&mut self, id: &str) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.subscribers.iter().any(|s| s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
        self.subscribers.iter().map(|s| s.id.clone()).collect()
    }
}
