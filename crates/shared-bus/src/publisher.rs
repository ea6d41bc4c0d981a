//! # Event Publisher
//!
//! Defines the publishing side of the event bus.

use crate::events::{EventFilter, KeyserverEvent};
use crate::queue::{work_queue, QueueSender, WorkQueue};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Trait for publishing events to the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to the bus.
    ///
    /// # Returns
    ///
    /// The number of active subscribers and work queues that received the
    /// event.
    async fn publish(&self, event: KeyserverEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the event bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
pub struct InMemoryEventBus {
    /// Broadcast sender for events.
    sender: broadcast::Sender<KeyserverEvent>,

    /// Active subscription count by topic.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Lossless queues, fed before the broadcast.
    queues: RwLock<Vec<QueueSender>>,

    /// Total events published.
    events_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            queues: RwLock::new(Vec::new()),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let topic_key = format!("{:?}", filter.topics);

        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(topic_key.clone()).or_insert(0) += 1;
        }

        debug!(topics = ?filter.topics, "New subscription created");

        Subscription::new(receiver, filter, self.subscriptions.clone(), topic_key)
    }

    /// Open a lossless queue for events matching `filter`. Publishers wait
    /// when `capacity` events are queued.
    #[must_use]
    pub fn work_queue(&self, filter: EventFilter, capacity: usize) -> WorkQueue {
        debug!(topics = ?filter.topics, capacity, "New work queue created");
        let (sender, queue) = work_queue(filter, capacity);
        if let Ok(mut queues) = self.queues.write() {
            queues.push(sender);
        }
        queue
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity.
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
    async fn publish(&self, event: KeyserverEvent) -> usize {
        let topic = event.topic();
        let source = event.source_subsystem();

        self.events_published.fetch_add(1, Ordering::Relaxed);

        let senders: Vec<_> = match self.queues.read() {
            Ok(queues) => queues
                .iter()
                .filter(|q| q.matches(&event))
                .map(QueueSender::sender)
                .collect(),
            Err(_) => Vec::new(),
        };
        let mut queued = 0;
        let mut closed = false;
        for sender in senders {
            if sender.send(event.clone()).await.is_ok() {
                queued += 1;
            } else {
                closed = true;
            }
        }
        if closed {
            if let Ok(mut queues) = self.queues.write() {
                queues.retain(|q| !q.is_closed());
            }
        }

        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(
                    topic = ?topic,
                    source = source,
                    receivers = receiver_count,
                    queued = queued,
                    "Event published"
                );
                receiver_count + queued
            }
            Err(_) => {
                // Nobody listening; common on nodes without peers.
                trace!(topic = ?topic, source = source, queued = queued, "No broadcast receivers");
                queued
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
