//! # Outbound Ports
//!
//! | Port | Implemented by |
//! |------|----------------|
//! | `RecordBackend` | `adapters::MemoryBackend`, node-runtime RocksDB backend |
//! | `PaymentGate` | node-runtime, over ks-01 and ks-02 |

use crate::domain::{StoreError, StoredRecord};
use async_trait::async_trait;
use ks_01_commitment_ledger::{CommitResponse, Redemption, TokenRejection};
use ks_02_payment_verification::ChainProofError;
use shared_types::{Address, CommitmentKey, Digest, TxId};

/// Durable record storage. Calls are short and synchronous; the store
/// serializes writers per address before calling in.
pub trait RecordBackend: Send + Sync {
    fn get(&self, address: &Address) -> Result<Option<StoredRecord>, StoreError>;

    fn put(&self, record: &StoredRecord) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    fn remove(&self, address: &Address) -> Result<bool, StoreError>;

    /// Addresses of every stored record.
    fn addresses(&self) -> Result<Vec<Address>, StoreError>;

    fn len(&self) -> usize;
}

/// Payment checks the write path depends on.
#[async_trait]
pub trait PaymentGate: Send + Sync {
    /// Implicit commit for a write that arrived without a token.
    fn commit(&self, key: CommitmentKey, payload_len: usize) -> CommitResponse;

    /// Validate a token without consuming it. Returns the redemption it
    /// would produce.
    fn check_token(
        &self,
        token: &str,
        key: &CommitmentKey,
    ) -> Result<Redemption, TokenRejection>;

    /// Consume a token for a write to `address`.
    fn redeem(
        &self,
        token: &str,
        key: &CommitmentKey,
        address: Address,
    ) -> Result<Redemption, TokenRejection>;

    /// Verify a peer's chain proof. Returns the transaction depth.
    async fn verify_chain_proof(
        &self,
        txid: TxId,
        metadata_digest: &Digest,
        payload_len: usize,
    ) -> Result<u64, ChainProofError>;
}
