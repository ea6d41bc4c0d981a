//! # Inbound Port - GossipApi
//!
//! Used by the HTTP façade. Pushes are not requested through this port:
//! they are driven by `PropagationReady` events (see `relay`).

use async_trait::async_trait;
use shared_types::{Address, PeerRecord};

#[async_trait]
pub trait GossipApi: Send + Sync {
    /// Fetch `address` from peers after a local miss. Returns the merged
    /// record bytes, or `None` if no peer had a verifiable record.
    async fn pull(&self, address: &Address) -> Option<Vec<u8>>;

    /// Configured peers with their health.
    fn peers(&self) -> Vec<PeerRecord>;
}
