#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Event bus shared by the peer services.
//!
//! The bus carries typed peer events (chaincode deployment, validity period
//! commits, update failures, health changes) with sequential identifiers. Recent
//! events are kept in a bounded replay ring so reconnecting subscribers (SSE
//! clients supplying `Last-Event-ID`) can catch up. Live delivery uses
//! `tokio::broadcast`; when the channel overflows the oldest events are dropped.

pub mod error;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};

pub use error::{EventBusError, EventBusResult};

/// Identifier assigned to each event emitted by the peer.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed events surfaced across the peer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A chaincode finished deployment and its init state is committed.
    ChaincodeDeployed {
        /// Identifier the chaincode was registered under.
        chaincode_id: String,
    },
    /// The scheduler committed a new validity period value.
    ValidityPeriodAdvanced {
        /// Owning chaincode.
        chaincode_id: String,
        /// Committed value in seconds.
        value: i64,
        /// Scheduler tick that produced the update.
        tick: u64,
        /// Ledger height of the commit.
        height: u64,
    },
    /// A scheduled update failed and will be retried on the next tick.
    UpdateFailed {
        /// Owning chaincode.
        chaincode_id: String,
        /// Scheduler tick that failed.
        tick: u64,
        /// Rendered failure.
        message: String,
    },
    /// Set of degraded components changed.
    HealthChanged {
        /// Components currently degraded.
        degraded: Vec<String>,
    },
}

impl Event {
    /// Machine-friendly discriminator for SSE consumers and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ChaincodeDeployed { .. } => "chaincode_deployed",
            Self::ValidityPeriodAdvanced { .. } => "validity_period_advanced",
            Self::UpdateFailed { .. } => "update_failed",
            Self::HealthChanged { .. } => "health_changed",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event.
    pub event: Event,
}

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a new bus with the provided broadcast capacity.
    ///
    /// The broadcast channel uses the same capacity as the in-memory replay
    /// buffer, ensuring dropped events impact both structures consistently.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default in-memory buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish a new event to the bus, assigning it a sequential identifier.
    ///
    /// Publishing with no live subscribers succeeds; the event is still kept
    /// for replay.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SendFailed`] when live subscribers exist but the
    /// broadcast send fails.
    pub fn publish(&self, event: Event) -> EventBusResult<EventId> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let event_kind = event.kind();
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.lock_buffer();
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        if self.sender.receiver_count() == 0 {
            return Ok(id);
        }
        self.sender
            .send(envelope)
            .map(|_| id)
            .map_err(|_| EventBusError::SendFailed {
                event_id: id,
                event_kind,
            })
    }

    /// Subscribe to the bus, replaying any buffered events newer than `since_id`.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let receiver = self.sender.subscribe();
        let mut backlog = VecDeque::new();
        if let Some(since) = since_id {
            let buffer = self.lock_buffer();
            backlog.extend(buffer.iter().filter(|item| item.id > since).cloned());
        }
        let replayed_through = backlog.back().map_or(since_id.unwrap_or(0), |item| item.id);

        EventStream {
            backlog,
            receiver,
            replayed_through,
        }
    }

    /// Returns the last assigned identifier, if any events have been published.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock_buffer().back().map(|event| event.id)
    }

    fn lock_buffer(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream wrapper that yields events either from the replay backlog or from the
/// live broadcast channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
    replayed_through: EventId,
}

impl EventStream {
    /// Receive the next event, respecting the replay backlog first.
    ///
    /// Events already delivered from the backlog are skipped when they also
    /// arrive on the live channel.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        loop {
            let envelope = match self.receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            };
            if envelope.id > self.replayed_through {
                return Some(envelope);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::task;
    use tokio::time::timeout;

    const PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

    fn advanced(tick: u64) -> Event {
        Event::ValidityPeriodAdvanced {
            chaincode_id: "validity_period_chaincode".to_string(),
            value: 1_700_000_000 + i64::try_from(tick).unwrap_or(0) * 37,
            tick,
            height: tick + 1,
        }
    }

    #[tokio::test]
    async fn sequential_ids_and_replay() {
        let bus = EventBus::with_capacity(16);

        let mut last_id = 0;
        for tick in 0..5 {
            last_id = bus.publish(advanced(tick)).expect("publish");
        }
        assert_eq!(last_id, 5);
        assert_eq!(bus.last_event_id(), Some(5));

        let mut stream = bus.subscribe(Some(2));
        let mut received = Vec::new();
        for _ in 0..3 {
            if let Some(event) = stream.next().await {
                received.push(event);
            }
        }

        assert_eq!(received.len(), 3);
        assert_eq!(received.first().map(|e| e.id), Some(3));
        assert_eq!(received.last().map(|e| e.id), Some(5));
    }

    #[tokio::test]
    async fn replay_ring_drops_oldest_events() {
        let bus = EventBus::with_capacity(2);
        for tick in 0..4 {
            let _ = bus.publish(advanced(tick)).expect("publish");
        }

        let mut stream = bus.subscribe(Some(0));
        let first = stream.next().await.expect("replayed event");
        assert_eq!(first.id, 3);
    }

    #[tokio::test]
    async fn live_events_follow_backlog_without_duplicates() {
        let bus = EventBus::with_capacity(8);
        let _ = bus.publish(advanced(0)).expect("publish");
        let mut stream = bus.subscribe(Some(0));
        let _ = bus.publish(advanced(1)).expect("publish");

        let replayed = stream.next().await.expect("backlog");
        let live = stream.next().await.expect("live");
        assert_eq!(replayed.id, 1);
        assert_eq!(live.id, 2);
    }

    #[test]
    fn event_kind_matches_serde_tag() {
        let event = Event::UpdateFailed {
            chaincode_id: "vp".to_string(),
            tick: 3,
            message: "disk full".to_string(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], event.kind());
    }

    #[tokio::test]
    async fn load_test_does_not_stall_publishers() {
        let bus = Arc::new(EventBus::with_capacity(512));
        let mut stream = bus.subscribe(None);

        let publisher = {
            let bus = bus.clone();
            task::spawn(async move {
                for tick in 0..500 {
                    let publish_bus = bus.clone();
                    timeout(PUBLISH_TIMEOUT, async move {
                        let _ = publish_bus.publish(advanced(tick));
                    })
                    .await
                    .expect("publish timed out");
                }
            })
        };

        let consumer = task::spawn(async move {
            let mut ids = HashSet::new();
            while ids.len() < 500 {
                if let Some(event) = stream.next().await {
                    ids.insert(event.id);
                }
            }
            ids
        });

        publisher.await.expect("publisher task panicked");
        let ids = consumer.await.expect("consumer task panicked");
        assert_eq!(ids.len(), 500);
    }
}
