//! # Event Publisher
//!
//! The publishing side of the facade-observable event bus.

use crate::events::{EventFilter, PtmEvent};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Interface components use to emit status events for consumption by
/// facade subscribers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event. Returns the number of active subscribers that
    /// received it.
    async fn publish(&self, event: PtmEvent) -> usize;

    /// Total events published since construction.
    fn events_published(&self) -> u64;
}

/// `tokio::sync::broadcast`-backed event bus. Suitable for single-node
/// operation; a distributed deployment would replace this adapter, not
/// `ptm-facade`'s use of the `EventPublisher` trait.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<PtmEvent>,
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    events_published: AtomicU64,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let topic_key = format!("{:?}/{:?}", filter.topics, filter.contract);

        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(topic_key.clone()).or_insert(0) += 1;
        }

        debug!(topics = ?filter.topics, "new event bus subscription");
        Subscription::new(receiver, filter, self.subscriptions.clone(), topic_key)
    }

    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: PtmEvent) -> usize {
        let topic = event.topic();
        self.events_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(?topic, receivers = receiver_count, "event published");
                receiver_count
            }
            Err(_) => {
                warn!(?topic, "event dropped: no subscribers");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptm_types::{ContractAddress, TxId, TxStatus};

    fn sample_event() -> PtmEvent {
        PtmEvent::StatusChanged {
            tx_id: TxId::nil(),
            contract: ContractAddress::zero(),
            status: TxStatus::Pending,
        }
    }

    #[tokio::test]
    async fn publish_no_subscribers() {
        let bus = InMemoryEventBus::new();
        let receivers = bus.publish(sample_event()).await;
        assert_eq!(receivers, 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn publish_with_subscriber() {
        let bus = InMemoryEventBus::new();
        let _sub = bus.subscribe(EventFilter::all());

        let receivers = bus.publish(sample_event()).await;
        assert_eq!(receivers, 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = InMemoryEventBus::new();
        let _sub1 = bus.subscribe(EventFilter::all());
        let _sub2 = bus.subscribe(EventFilter::all());

        let receivers = bus.publish(sample_event()).await;
        assert_eq!(receivers, 2);
    }

    #[test]
    fn custom_capacity() {
        let bus = InMemoryEventBus::with_capacity(100);
        assert_eq!(bus.capacity(), 100);
    }
}
