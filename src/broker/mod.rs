pub mod engine;
pub mod message;
pub mod topic;

pub use engine::Broker;
pub use message::{BrokerStats, DeliveryCallback, Message, PublishOutcome};
pub use topic::{BROADCAST_TOPIC, SubscriberId, room_id_of, room_topic, user_id_of, user_topic};

pub use crate::utils::DeliveryError;

#[cfg(test)]
mod tests;
