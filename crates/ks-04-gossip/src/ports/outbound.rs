//! # Outbound Ports
//!
//! | Port | Implemented by |
//! |------|----------------|
//! | `PeerTransport` | `adapters::HttpTransport` |
//! | `LocalStore` | node-runtime, over the ks-03 metadata store |

use crate::domain::{GossipError, LocalRecord, PushOutcome, TransportError};
use async_trait::async_trait;
use shared_types::{Address, TxId};

/// Calls to one peer's public endpoints.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Write `raw` to the peer, proving payment with the confirmed `txid`.
    async fn push_record(
        &self,
        peer: &str,
        address: &Address,
        raw: &[u8],
        txid: &TxId,
    ) -> Result<PushOutcome, TransportError>;

    /// Read the peer's record without letting it pull in turn.
    async fn fetch_record(
        &self,
        peer: &str,
        address: &Address,
    ) -> Result<Option<Vec<u8>>, TransportError>;
}

/// The local metadata store, as seen by the engine.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn load(&self, address: &Address) -> Result<Option<LocalRecord>, GossipError>;

    /// Merge a verified peer record through the normal write path.
    async fn merge(&self, address: Address, raw: Vec<u8>) -> Result<(), GossipError>;
}
