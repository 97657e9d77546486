//! Delayed publishing.
//!
//! Messages wait in the [`Scheduler`]'s own list until due. A periodic task
//! calls [`Scheduler::run_due`], which removes due entries under the lock and
//! publishes them through the broker after releasing it.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker::Broker;
pub use crate::utils::ScheduleError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledMessage {
    pub id: String,
    pub owner: String,
    pub topic: String,
    pub payload: Bytes,
    pub created_at: i64,
    /// Unix milliseconds at or after which the message is published.
    pub due_at: i64,
}

pub struct Scheduler {
    broker: Arc<Broker>,
    pending: Mutex<Vec<ScheduledMessage>>,
}

impl Scheduler {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self {
            broker,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Queues `payload` for `topic`, due `delay` from now. Returns the entry id.
    pub fn schedule(
        &self,
        owner: &str,
        topic: &str,
        payload: impl Into<Bytes>,
        delay: Duration,
    ) -> Result<String, ScheduleError> {
        let delay_ms = i64::try_from(delay.as_millis()).map_err(|_| ScheduleError::InvalidDelay(format!("{delay:?}")))?;
        let due_at = now_millis().saturating_add(delay_ms);
        self.schedule_at(owner, topic, payload, due_at)
    }

    pub fn schedule_at(
        &self,
        owner: &str,
        topic: &str,
        payload: impl Into<Bytes>,
        due_at: i64,
    ) -> Result<String, ScheduleError> {
        let payload = payload.into();
        if payload.is_empty() {
            return Err(ScheduleError::EmptyMessage);
        }

        let entry = ScheduledMessage {
            id: Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            topic: topic.to_string(),
            payload,
            created_at: now_millis(),
            due_at,
        };
        let id = entry.id.clone();
        debug!(id = %id, owner, topic, due_at, "message scheduled");
        self.pending().push(entry);
        Ok(id)
    }

    /// Removes a pending entry. Only its owner may cancel it.
    pub fn cancel(&self, id: &str, owner: &str) -> Result<ScheduledMessage, ScheduleError> {
        let mut pending = self.pending();
        let pos = pending
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| ScheduleError::NotFound(id.to_string()))?;
        if pending[pos].owner != owner {
            return Err(ScheduleError::NotOwner(id.to_string()));
        }
        Ok(pending.remove(pos))
    }

    /// `owner`'s pending entries, soonest first.
    pub fn pending_for(&self, owner: &str) -> Vec<ScheduledMessage> {
        let mut entries: Vec<_> = self.pending().iter().filter(|m| m.owner == owner).cloned().collect();
        entries.sort_by_key(|m| m.due_at);
        entries
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Publishes every entry due at `now`. Returns how many were published.
    pub fn run_due(&self, now: i64) -> usize {
        let due: Vec<ScheduledMessage> = {
            let mut pending = self.pending();
            let (due, waiting): (Vec<_>, Vec<_>) = pending.drain(..).partition(|m| m.due_at <= now);
            *pending = waiting;
            due
        };

        for message in &due {
            let outcome = self.broker.publish(&message.topic, message.payload.clone(), &message.owner);
            if outcome.recipients == 0 {
                warn!(id = %message.id, topic = %message.topic, "scheduled message had no recipients");
            } else {
                debug!(id = %message.id, topic = %message.topic, delivered = outcome.delivered, "scheduled message published");
            }
        }
        due.len()
    }

    /// Runs [`run_due`](Self::run_due) every `tick` until `shutdown` resolves.
    pub async fn run(self: Arc<Self>, tick: Duration, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(tick_ms = tick.as_millis() as u64, "scheduler started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.run_due(now_millis());
                }
            }
        }
        info!(pending = self.pending_count(), "scheduler stopped");
    }

    fn pending(&self) -> MutexGuard<'_, Vec<ScheduledMessage>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Parses `<number><unit>` where unit is `s`, `m`, `h` or `d` (e.g. `30s`, `2h`).
pub fn parse_delay(spec: &str) -> Result<Duration, ScheduleError> {
    let invalid = || ScheduleError::InvalidDelay(spec.to_string());

    let unit = spec.chars().last().ok_or_else(invalid)?;
    let digits = &spec[..spec.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    let scale = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return Err(invalid()),
    };
    value.checked_mul(scale).map(Duration::from_secs).ok_or_else(invalid)
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
