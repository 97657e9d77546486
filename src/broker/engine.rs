use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::broker::message::{BrokerStats, DeliveryCallback, Message, PublishOutcome};
use crate::broker::topic::{BROADCAST_TOPIC, Subscriber, SubscriberId, Topic, room_topic, user_topic};
use crate::utils::DeliveryError;

#[derive(Debug, Default)]
struct Registry {
    topics: HashMap<String, Topic>,
    subscriptions: HashMap<SubscriberId, HashSet<String>>,
}

/// Represents the broker that routes messages from publishers to topic subscribers.
///
/// Both directions of the subscription map (topic -> subscribers and
/// subscriber -> topics) live behind one lock and are only mutated together.
/// `publish` copies the subscriber list under that lock and invokes the
/// callbacks after releasing it, so a callback may subscribe, unsubscribe or
/// publish without deadlocking, and a slow callback never blocks unrelated
/// mutations.
#[derive(Debug, Default)]
pub struct Broker {
    registry: Mutex<Registry>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `subscriber_id` to `topic`, creating the topic on first use.
    ///
    /// Subscribing again with the same id replaces the callback; there is never
    /// more than one entry per `(subscriber, topic)`. Empty identifiers are
    /// refused with `false`.
    pub fn subscribe<F>(&self, subscriber_id: &str, topic: &str, callback: F) -> bool
    where
        F: Fn(&Message) -> Result<(), DeliveryError> + Send + Sync + 'static,
    {
        self.subscribe_callback(subscriber_id, topic, Arc::new(callback))
    }

    /// [`subscribe`](Self::subscribe) with an already shared callback.
    pub fn subscribe_callback(&self, subscriber_id: &str, topic: &str, callback: DeliveryCallback) -> bool {
        if subscriber_id.is_empty() || topic.is_empty() {
            warn!(subscriber = subscriber_id, topic, "refusing subscription with empty identifier");
            return false;
        }

        let mut registry = self.registry();
        let added = registry
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(Subscriber {
                id: subscriber_id.to_string(),
                callback,
            });
        registry
            .subscriptions
            .entry(subscriber_id.to_string())
            .or_default()
            .insert(topic.to_string());

        if added {
            debug!(subscriber = subscriber_id, topic, "subscribed");
        } else {
            debug!(subscriber = subscriber_id, topic, "subscription callback replaced");
        }
        true
    }

    /// Removes one subscription. Returns `false` when there was nothing to remove.
    ///
    /// Empty topics and empty per-subscriber topic sets are dropped.
    pub fn unsubscribe(&self, subscriber_id: &str, topic: &str) -> bool {
        let mut registry = self.registry();
        let removed = registry.remove_entry(subscriber_id, topic);

        if let Some(topics) = registry.subscriptions.get_mut(subscriber_id) {
            topics.remove(topic);
            if topics.is_empty() {
                registry.subscriptions.remove(subscriber_id);
            }
        }

        if removed {
            debug!(subscriber = subscriber_id, topic, "unsubscribed");
        }
        removed
    }

    /// Removes every subscription held by `subscriber_id` in one step.
    ///
    /// Returns how many topics the subscriber was removed from. Once this
    /// returns, no later `publish` can reach the subscriber's callbacks.
    pub fn unsubscribe_all(&self, subscriber_id: &str) -> usize {
        let mut registry = self.registry();
        let Some(topics) = registry.subscriptions.remove(subscriber_id) else {
            return 0;
        };

        let count = topics.len();
        for topic in &topics {
            registry.remove_entry(subscriber_id, topic);
        }
        debug!(subscriber = subscriber_id, topics = count, "unsubscribed from all topics");
        count
    }

    /// Delivers `payload` to every subscriber of `topic` except `sender_id`.
    ///
    /// An empty `sender_id` disables loopback suppression. A callback that
    /// fails or panics is logged and counted; the remaining subscribers are
    /// still delivered to.
    pub fn publish(&self, topic: &str, payload: impl Into<Bytes>, sender_id: &str) -> PublishOutcome {
        let snapshot = {
            let registry = self.registry();
            match registry.topics.get(topic) {
                Some(t) => t.subscribers.clone(),
                None => {
                    debug!(topic, "publish to topic with no subscribers");
                    return PublishOutcome::default();
                }
            }
        };

        let message = Message::new(topic, payload, sender_id);
        let mut outcome = PublishOutcome::default();

        for subscriber in snapshot
            .iter()
            .filter(|s| sender_id.is_empty() || s.id != sender_id)
        {
            outcome.recipients += 1;
            let result = catch_unwind(AssertUnwindSafe(|| (subscriber.callback)(&message)))
                .unwrap_or(Err(DeliveryError::Panicked));
            match result {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    warn!(subscriber = %subscriber.id, topic, error = %e, "delivery failed");
                    outcome.failed.push(subscriber.id.clone());
                }
            }
        }

        outcome
    }

    pub fn publish_to_room(&self, room_id: &str, payload: impl Into<Bytes>, sender_id: &str) -> PublishOutcome {
        self.publish(&room_topic(room_id), payload, sender_id)
    }

    pub fn publish_to_user(&self, user_id: &str, payload: impl Into<Bytes>, sender_id: &str) -> PublishOutcome {
        self.publish(&user_topic(user_id), payload, sender_id)
    }

    /// Publishes to [`BROADCAST_TOPIC`]; each subscriber of that topic receives it once.
    pub fn broadcast(&self, payload: impl Into<Bytes>, sender_id: &str) -> PublishOutcome {
        self.publish(BROADCAST_TOPIC, payload, sender_id)
    }

    /// Subscriber ids of `topic`, in subscription order.
    pub fn subscribers(&self, topic: &str) -> Vec<SubscriberId> {
        self.registry()
            .topics
            .get(topic)
            .map(Topic::subscriber_ids)
            .unwrap_or_default()
    }

    /// Topics `subscriber_id` is on, sorted.
    pub fn subscribed_topics(&self, subscriber_id: &str) -> Vec<String> {
        let mut topics: Vec<String> = self
            .registry()
            .subscriptions
            .get(subscriber_id)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default();
        topics.sort();
        topics
    }

    pub fn is_subscribed(&self, subscriber_id: &str, topic: &str) -> bool {
        self.registry()
            .topics
            .get(topic)
            .is_some_and(|t| t.contains(subscriber_id))
    }

    pub fn topic_count(&self) -> usize {
        self.registry().topics.len()
    }

    /// Distinct subscribers with at least one subscription.
    pub fn subscriber_count(&self) -> usize {
        self.registry().subscriptions.len()
    }

    pub fn total_subscriptions(&self) -> usize {
        self.registry().topics.values().map(Topic::len).sum()
    }

    pub fn stats(&self) -> BrokerStats {
        let registry = self.registry();
        BrokerStats {
            topics: registry.topics.len(),
            subscribers: registry.subscriptions.len(),
            subscriptions: registry.topics.values().map(Topic::len).sum(),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            topics = stats.topics,
            subscribers = stats.subscribers,
            subscriptions = stats.subscriptions,
            "broker stats"
        );
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Registry {
    /// Drops the topic-side entry, and the topic itself once empty.
    fn remove_entry(&mut self, subscriber_id: &str, topic: &str) -> bool {
        let Some(t) = self.topics.get_mut(topic) else {
            return false;
        };
        let removed = t.unsubscribe(subscriber_id);
        if t.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }
}
