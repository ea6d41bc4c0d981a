//! # Inbound Port - MetadataStoreApi
//!
//! Every write reaches the store through `put`: client uploads, peer pushes
//! and pulled records alike. Only the authorization differs.

use crate::domain::{StoreError, StoredRecord, WriteAuthorization, WriteReceipt};
use async_trait::async_trait;
use shared_types::Address;

#[async_trait]
pub trait MetadataStoreApi: Send + Sync {
    /// Validate and store the encoded `AuthWrapper` `raw` under `address`.
    async fn put(
        &self,
        address: Address,
        raw: Vec<u8>,
        authorization: WriteAuthorization,
    ) -> Result<WriteReceipt, StoreError>;

    /// Current unexpired record. Expired records are removed on the way.
    async fn get(&self, address: &Address) -> Result<Option<StoredRecord>, StoreError>;

    /// Remove every expired record. Returns how many were dropped.
    async fn prune_expired(&self) -> Result<usize, StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
