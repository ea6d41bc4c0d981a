//! # Outbound Ports
//!
//! The external payment network, seen as a queryable ledger.

use crate::domain::{LedgerTransaction, OracleError};
use async_trait::async_trait;
use shared_types::{Digest, TxId};
use tokio::sync::watch;

/// Ledger oracle - outbound port.
///
/// Implementations must not block indefinitely; the verifier wraps every
/// call in its own timeout as well.
#[async_trait]
pub trait LedgerOracle: Send + Sync {
    /// Submit a raw transaction. Re-broadcasting a known transaction is not
    /// an error.
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<TxId, OracleError>;

    /// Look up a transaction. `None` means the ledger does not know it
    /// (never seen, evicted, or reorged out).
    async fn transaction(&self, txid: &TxId) -> Result<Option<LedgerTransaction>, OracleError>;

    /// Transactions in the unconfirmed pool or recent blocks with a data
    /// output equal to `digest`.
    async fn find_by_data(&self, digest: &Digest) -> Result<Vec<LedgerTransaction>, OracleError>;

    /// Tip height updates, when the oracle can push them.
    fn block_notifications(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}
