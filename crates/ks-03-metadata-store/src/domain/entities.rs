//! Metadata store entities.

use serde::{Deserialize, Serialize};
use shared_bus::WriteSource;
use shared_types::{Address, AddressMetadata, Credential, Digest, TxId};

/// The authoritative record for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub address: Address,
    /// Encoded `AuthWrapper`, served and replicated verbatim.
    pub raw: Vec<u8>,
    /// Decoded payload, kept for timestamp and TTL checks.
    pub metadata: AddressMetadata,
    /// SHA-256 of the signed payload.
    pub metadata_digest: Digest,
    pub accepted_at: u64,
    /// Depth of the paying transaction when the write was accepted.
    pub confirmation_depth: u64,
    /// Paying transaction, when known. Pulled records carry none.
    pub txid: Option<TxId>,
    pub source: WriteSource,
}

impl StoredRecord {
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        self.metadata.is_expired(now)
    }

    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.metadata.timestamp
    }
}

/// What authorizes a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAuthorization {
    /// No credential: answered with an implicit commit.
    None,
    /// A token minted by this node.
    Bearer(String),
    /// A peer push naming the confirmed paying transaction.
    ChainProof(TxId),
    /// Merged from a peer after a read miss. Payment is not re-checked.
    PeerSourced,
}

impl WriteAuthorization {
    #[must_use]
    pub fn source(&self) -> WriteSource {
        match self {
            Self::None | Self::Bearer(_) => WriteSource::Client,
            Self::ChainProof(_) => WriteSource::Push,
            Self::PeerSourced => WriteSource::Pull,
        }
    }
}

impl From<Option<Credential>> for WriteAuthorization {
    fn from(credential: Option<Credential>) -> Self {
        match credential {
            None => Self::None,
            Some(Credential::Token(token)) => Self::Bearer(token),
            Some(Credential::ChainProof(txid)) => Self::ChainProof(txid),
        }
    }
}

/// Store limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Largest accepted `serialized_payload`.
    pub max_payload_size: usize,
    /// Seconds a timestamp may run ahead of the local clock.
    pub clock_skew: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 5 * 1024,
            clock_skew: 300,
        }
    }
}

/// An accepted write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    pub address: Address,
    pub timestamp: u64,
    pub metadata_digest: Digest,
    pub source: WriteSource,
    /// A push to peers was scheduled immediately.
    pub propagating: bool,
}
