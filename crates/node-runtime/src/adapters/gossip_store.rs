//! # Gossip Store Adapter
//!
//! Implements the gossip engine's `LocalStore` outbound port over the
//! metadata store. Pulled records enter through the ordinary write path as
//! `PeerSourced`, so signature, freshness and last-writer-wins still apply.

use async_trait::async_trait;
use ks_03_metadata_store::{MetadataStoreApi, WriteAuthorization};
use ks_04_gossip::{GossipError, LocalRecord, LocalStore};
use shared_types::Address;
use std::sync::Arc;

pub struct StoreBridge<S: MetadataStoreApi> {
    store: Arc<S>,
}

impl<S: MetadataStoreApi> StoreBridge<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: MetadataStoreApi> LocalStore for StoreBridge<S> {
    async fn load(&self, address: &Address) -> Result<Option<LocalRecord>, GossipError> {
        let record = self
            .store
            .get(address)
            .await
            .map_err(|e| GossipError::Store(e.to_string()))?;
        Ok(record.map(|r| LocalRecord {
            raw: r.raw,
            metadata_digest: r.metadata_digest,
        }))
    }

    async fn merge(&self, address: Address, raw: Vec<u8>) -> Result<(), GossipError> {
        self.store
            .put(address, raw, WriteAuthorization::PeerSourced)
            .await
            .map(|_| ())
            .map_err(|e| GossipError::Store(e.to_string()))
    }
}
