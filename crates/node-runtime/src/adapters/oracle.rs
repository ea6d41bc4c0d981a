//! # Ledger Oracle Selection
//!
//! The verifier is generic over one oracle type; [`NodeOracle`] lets the
//! runtime pick the simulated chain or a JSON-RPC node from configuration.

use async_trait::async_trait;
use ks_02_payment_verification::{
    InMemoryLedger, JsonRpcOracle, LedgerOracle, LedgerTransaction, OracleError,
};
use shared_types::{Digest, TxId};
use std::sync::Arc;
use tokio::sync::watch;

pub enum NodeOracle {
    /// Simulated chain, shared so the devnet miner and tests can drive it.
    Devnet(Arc<InMemoryLedger>),
    JsonRpc(JsonRpcOracle),
}

impl NodeOracle {
    /// The simulated chain, if this is a devnet oracle.
    pub fn devnet(&self) -> Option<Arc<InMemoryLedger>> {
        match self {
            Self::Devnet(chain) => Some(chain.clone()),
            Self::JsonRpc(_) => None,
        }
    }
}

#[async_trait]
impl LedgerOracle for NodeOracle {
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<TxId, OracleError> {
        match self {
            Self::Devnet(chain) => chain.broadcast(raw_tx).await,
            Self::JsonRpc(rpc) => rpc.broadcast(raw_tx).await,
        }
    }

    async fn transaction(&self, txid: &TxId) -> Result<Option<LedgerTransaction>, OracleError> {
        match self {
            Self::Devnet(chain) => chain.transaction(txid).await,
            Self::JsonRpc(rpc) => rpc.transaction(txid).await,
        }
    }

    async fn find_by_data(&self, digest: &Digest) -> Result<Vec<LedgerTransaction>, OracleError> {
        match self {
            Self::Devnet(chain) => chain.find_by_data(digest).await,
            Self::JsonRpc(rpc) => rpc.find_by_data(digest).await,
        }
    }

    fn block_notifications(&self) -> Option<watch::Receiver<u64>> {
        match self {
            Self::Devnet(chain) => chain.block_notifications(),
            Self::JsonRpc(rpc) => rpc.block_notifications(),
        }
    }
}
