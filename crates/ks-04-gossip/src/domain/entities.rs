//! Gossip entities.

use super::errors::TransportError;
use shared_types::{Address, BackoffPolicy, Digest};
use std::time::Duration;

/// Gossip tuning and the static peer set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipConfig {
    /// Peer base URLs. Directed: peers need not list us back.
    pub peers: Vec<String>,
    /// Peers queried per pull. Zero means all.
    pub fanout: usize,
    /// Bound on every single peer call.
    pub peer_timeout: Duration,
    /// Retry schedule for pushes.
    pub push_retry: BackoffPolicy,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            fanout: 4,
            peer_timeout: Duration::from_secs(10),
            push_retry: BackoffPolicy::default(),
        }
    }
}

/// What the local store holds for an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRecord {
    pub raw: Vec<u8>,
    pub metadata_digest: Digest,
}

/// A peer's answer to a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    /// The peer already holds an equal or newer record.
    Conflict,
    /// 402: the peer does not yet see the payment at confirmation depth.
    Unconfirmed,
    /// Any other 4xx.
    Rejected(u16),
}

impl PushOutcome {
    /// Metric label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Conflict => "conflict",
            Self::Unconfirmed => "unconfirmed",
            Self::Rejected(_) => "rejected",
        }
    }

    /// Whether the push is settled. An unconfirmed answer is worth asking
    /// again once the peer's ledger catches up.
    #[must_use]
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Unconfirmed)
    }
}

/// Result of pushing one record to one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResult {
    pub peer: String,
    pub address: Address,
    pub attempts: u32,
    pub outcome: Result<PushOutcome, TransportError>,
}
