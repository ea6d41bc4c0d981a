//! # Keyserver Events
//!
//! Every state change another subsystem may react to.
//!
//! | Event | Publisher | Typical consumer |
//! |-------|-----------|------------------|
//! | `PaymentAccepted` | ks-02 | logging |
//! | `PaymentConfirmed` | ks-02 watcher | logging |
//! | `PaymentReverted` | ks-02 watcher | logging |
//! | `RecordAccepted` | ks-03 | logging, metrics |
//! | `PropagationReady` | ks-02 watcher, ks-03 | ks-04 push |
//! | `PropagationCancelled` | ks-02 watcher | logging |

use serde::{Deserialize, Serialize};
use shared_types::{Address, CommitmentKey, Digest, TxId};

/// How an accepted write reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteSource {
    /// A client redeeming a token.
    Client,
    /// A peer pushing a confirmed record with a chain proof.
    Push,
    /// Merged from a peer on a local read miss.
    Pull,
}

impl WriteSource {
    /// Label used in metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }
}

/// Events published on the keyserver bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyserverEvent {
    /// A payment satisfying a commitment was observed and a token minted.
    PaymentAccepted {
        key: CommitmentKey,
        txid: TxId,
        depth: u64,
    },
    /// A paying transaction reached the confirmation threshold.
    PaymentConfirmed {
        key: CommitmentKey,
        txid: TxId,
        depth: u64,
    },
    /// A previously observed payment disappeared from the ledger.
    PaymentReverted { key: CommitmentKey, txid: TxId },
    /// The store accepted a write.
    RecordAccepted {
        address: Address,
        timestamp: u64,
        source: WriteSource,
    },
    /// An accepted record is backed by a confirmed payment and may be pushed.
    PropagationReady {
        address: Address,
        metadata_digest: Digest,
        txid: TxId,
    },
    /// A pending push was dropped because its payment vanished.
    PropagationCancelled { address: Address, txid: TxId },
}

impl KeyserverEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::PaymentAccepted { .. }
            | Self::PaymentConfirmed { .. }
            | Self::PaymentReverted { .. } => EventTopic::Payments,
            Self::RecordAccepted { .. } => EventTopic::Store,
            Self::PropagationReady { .. } | Self::PropagationCancelled { .. } => {
                EventTopic::Gossip
            }
        }
    }

    /// Get the originating subsystem ID.
    #[must_use]
    pub fn source_subsystem(&self) -> u8 {
        match self {
            Self::PaymentAccepted { .. }
            | Self::PaymentConfirmed { .. }
            | Self::PaymentReverted { .. }
            | Self::PropagationCancelled { .. } => 2,
            Self::RecordAccepted { .. } => 3,
            // Raised by the watcher (2) or directly on a confirmed write (3).
            Self::PropagationReady { .. } => 2,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Subsystem 2 events.
    Payments,
    /// Subsystem 3 events.
    Store,
    /// Replication triggers for subsystem 4.
    Gossip,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &KeyserverEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
