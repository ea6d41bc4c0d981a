//! # Shared Bus - Event Bus for Inter-Subsystem Communication
//!
//! Subsystems never call each other to announce state changes; they publish
//! a [`KeyserverEvent`] and whoever cares subscribes.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ ks-02 Payment│                    │ ks-04 Gossip │
//! │ ks-03 Store  │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! The key consumer is the gossip engine, which waits for
//! [`KeyserverEvent::PropagationReady`] before pushing a record to peers.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod queue;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, KeyserverEvent, WriteSource};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use queue::WorkQueue;
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Default depth of a [`WorkQueue`] before publishers wait.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
