use std::sync::{Arc, OnceLock};

use bytes::Bytes;

use super::topic::SubscriberId;
use crate::utils::DeliveryError;

/// Represents a published message in the Pub/Sub system.
///
/// The payload is opaque to the broker: it may be an encoded packet or any
/// other bytes the publisher chose. Cloning a message shares the payload
/// buffer rather than copying it.
///
/// # Fields
///
/// - `topic` - The topic this message was published to.
/// - `payload` - The bytes handed to every recipient unchanged.
/// - `sender_id` - Publishing subscriber, empty for system messages.
/// - `published_at` - Unix timestamp in milliseconds.
#[derive(Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub payload: Bytes,
    pub sender_id: SubscriberId,
    pub published_at: i64,
    wire: OnceLock<Result<Bytes, DeliveryError>>,
}

impl Message {
    pub fn new(topic: &str, payload: impl Into<Bytes>, sender_id: &str) -> Self {
        Self {
            topic: topic.to_string(),
            payload: payload.into(),
            sender_id: sender_id.to_string(),
            published_at: chrono::Utc::now().timestamp_millis(),
            wire: OnceLock::new(),
        }
    }

    /// Outbound bytes for this message, built by the first caller's `encode`.
    ///
    /// One publish hands the same `Message` to every subscriber, so the
    /// encoding runs once and later callers get a clone of the shared buffer
    /// (or of the same error).
    pub fn wire_frame(
        &self,
        encode: impl FnOnce(&Message) -> Result<Bytes, DeliveryError>,
    ) -> Result<Bytes, DeliveryError> {
        self.wire.get_or_init(|| encode(self)).clone()
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.topic == other.topic
            && self.payload == other.payload
            && self.sender_id == other.sender_id
            && self.published_at == other.published_at
    }
}

impl Eq for Message {}

/// Delivery callback registered with the broker.
///
/// Runs on the publisher's thread with no broker lock held, so it may
/// re-enter the broker. It should hand the message off (e.g. to a channel)
/// rather than block.
pub type DeliveryCallback = Arc<dyn Fn(&Message) -> Result<(), DeliveryError> + Send + Sync>;

/// What happened to one `publish` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Subscribers in the snapshot after loopback suppression.
    pub recipients: usize,
    pub delivered: usize,
    /// Subscribers whose callback returned an error or panicked.
    pub failed: Vec<SubscriberId>,
}

impl PublishOutcome {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Point-in-time registry counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub topics: usize,
    pub subscribers: usize,
    pub subscriptions: usize,
}
