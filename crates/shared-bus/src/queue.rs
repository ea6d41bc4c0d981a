//! # Work Queues
//!
//! A broadcast subscription drops its oldest events when the subscriber
//! falls behind. A work queue is a bounded `mpsc` fed by the same
//! [`publish`](crate::EventPublisher::publish) call; when it is full the
//! publisher waits for room instead of losing the event.
//!
//! Use one for events that carry work nobody would redo, such as
//! [`KeyserverEvent::PropagationReady`].

use crate::events::{EventFilter, KeyserverEvent};
use tokio::sync::mpsc;

/// Receiving end of a work queue.
pub struct WorkQueue {
    receiver: mpsc::Receiver<KeyserverEvent>,
}

impl WorkQueue {
    /// Next queued event; `None` once the bus is gone and the queue drained.
    pub async fn recv(&mut self) -> Option<KeyserverEvent> {
        self.receiver.recv().await
    }

    /// Next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<KeyserverEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Bus-side handle of a work queue.
pub(crate) struct QueueSender {
    filter: EventFilter,
    sender: mpsc::Sender<KeyserverEvent>,
}

impl QueueSender {
    pub(crate) fn matches(&self, event: &KeyserverEvent) -> bool {
        self.filter.matches(event)
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<KeyserverEvent> {
        self.sender.clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

pub(crate) fn work_queue(filter: EventFilter, capacity: usize) -> (QueueSender, WorkQueue) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (QueueSender { filter, sender }, WorkQueue { receiver })
}
