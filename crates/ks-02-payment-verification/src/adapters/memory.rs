//! # In-Memory Ledger
//!
//! A simulated payment network: an unconfirmed pool, a list of blocks and a
//! tip-height notification channel. Used by tests and the `devnet` runtime
//! mode, where it stands in for a real node.
//!
//! Raw transactions are bincode-encoded [`SimulatedTransaction`]s and the
//! txid is the SHA-256 of the raw bytes.

use crate::domain::{LedgerTransaction, OracleError};
use crate::ports::LedgerOracle;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_crypto::digest;
use shared_types::{data_output, Digest, PaymentOutput, TxId};
use std::collections::HashMap;
use tokio::sync::watch;
use tracing::debug;

/// Output of a [`SimulatedTransaction`].
///
/// Separate from [`PaymentOutput`] because bincode cannot decode internally
/// tagged enums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulatedOutput {
    Pay { recipient: String, amount: u64 },
    Data(Vec<u8>),
}

impl From<PaymentOutput> for SimulatedOutput {
    fn from(output: PaymentOutput) -> Self {
        match output {
            PaymentOutput::Payment { recipient, amount } => Self::Pay { recipient, amount },
            PaymentOutput::Data { data } => Self::Data(data),
        }
    }
}

impl From<SimulatedOutput> for PaymentOutput {
    fn from(output: SimulatedOutput) -> Self {
        match output {
            SimulatedOutput::Pay { recipient, amount } => Self::Payment { recipient, amount },
            SimulatedOutput::Data(data) => Self::Data { data },
        }
    }
}

/// Transaction format accepted by [`InMemoryLedger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedTransaction {
    /// Distinguishes otherwise identical payments.
    pub nonce: u64,
    pub outputs: Vec<SimulatedOutput>,
}

impl SimulatedTransaction {
    #[must_use]
    pub fn new(outputs: Vec<PaymentOutput>) -> Self {
        Self {
            nonce: rand::random(),
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }

    /// A transaction paying `amount` to `recipient` and carrying `metadata_digest`.
    #[must_use]
    pub fn paying(recipient: &str, amount: u64, metadata_digest: &Digest) -> Self {
        Self::new(vec![
            PaymentOutput::Payment {
                recipient: recipient.to_string(),
                amount,
            },
            data_output(metadata_digest),
        ])
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn decode(raw: &[u8]) -> Result<Self, OracleError> {
        bincode::deserialize(raw).map_err(|e| OracleError::Rejected(e.to_string()))
    }

    #[must_use]
    pub fn txid_of(raw: &[u8]) -> TxId {
        TxId(digest(raw))
    }
}

#[derive(Default)]
struct ChainState {
    transactions: HashMap<TxId, Vec<PaymentOutput>>,
    mempool: Vec<TxId>,
    blocks: Vec<Vec<TxId>>,
    unavailable: bool,
}

impl ChainState {
    fn depth_of(&self, txid: &TxId) -> Option<u64> {
        if !self.transactions.contains_key(txid) {
            return None;
        }
        let height = self.blocks.len();
        self.blocks
            .iter()
            .position(|block| block.contains(txid))
            .map(|index| (height - index) as u64)
            .or(Some(0))
    }

    fn view(&self, txid: &TxId) -> Option<LedgerTransaction> {
        let outputs = self.transactions.get(txid)?;
        Some(LedgerTransaction {
            txid: *txid,
            outputs: outputs.clone(),
            depth: self.depth_of(txid)?,
        })
    }

    fn check_available(&self) -> Result<(), OracleError> {
        if self.unavailable {
            Err(OracleError::Unavailable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Simulated ledger.
pub struct InMemoryLedger {
    state: RwLock<ChainState>,
    tip: watch::Sender<u64>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        let (tip, _) = watch::channel(0);
        Self {
            state: RwLock::new(ChainState::default()),
            tip,
        }
    }

    /// Number of blocks.
    pub fn height(&self) -> u64 {
        self.state.read().blocks.len() as u64
    }

    pub fn mempool_len(&self) -> usize {
        self.state.read().mempool.len()
    }

    /// Confirmations of `txid`, `None` if unknown.
    pub fn depth_of(&self, txid: &TxId) -> Option<u64> {
        self.state.read().depth_of(txid)
    }

    /// Accept a raw transaction without going through the oracle port, as a
    /// wallet broadcasting directly to the network would.
    pub fn submit(&self, raw: &[u8]) -> Result<TxId, OracleError> {
        let tx = SimulatedTransaction::decode(raw)?;
        let txid = SimulatedTransaction::txid_of(raw);
        let mut state = self.state.write();
        if !state.transactions.contains_key(&txid) {
            let outputs = tx.outputs.into_iter().map(Into::into).collect();
            state.transactions.insert(txid, outputs);
            state.mempool.push(txid);
            debug!("[ks-02] devnet: {} entered mempool", txid);
        }
        Ok(txid)
    }

    /// Mine the unconfirmed pool into a new block. Returns the new height.
    pub fn mine_block(&self) -> u64 {
        let height = {
            let mut state = self.state.write();
            let block = std::mem::take(&mut state.mempool);
            state.blocks.push(block);
            state.blocks.len() as u64
        };
        self.tip.send_replace(height);
        height
    }

    pub fn mine_blocks(&self, count: u64) -> u64 {
        let mut height = self.height();
        for _ in 0..count {
            height = self.mine_block();
        }
        height
    }

    /// Drop the top `depth` blocks together with every transaction they
    /// contained, as if a competing chain double-spent them.
    pub fn reorg(&self, depth: usize) -> Vec<TxId> {
        let (dropped, height) = {
            let mut state = self.state.write();
            let keep = state.blocks.len().saturating_sub(depth);
            let removed: Vec<TxId> = state.blocks.drain(keep..).flatten().collect();
            for txid in &removed {
                state.transactions.remove(txid);
            }
            (removed, state.blocks.len() as u64)
        };
        self.tip.send_replace(height);
        dropped
    }

    /// Remove an unconfirmed transaction. Returns false if it was mined or unknown.
    pub fn evict(&self, txid: &TxId) -> bool {
        let mut state = self.state.write();
        let Some(pos) = state.mempool.iter().position(|t| t == txid) else {
            return false;
        };
        state.mempool.remove(pos);
        state.transactions.remove(txid);
        true
    }

    /// Make every oracle call fail with `Unavailable` until re-enabled.
    pub fn set_available(&self, available: bool) {
        self.state.write().unavailable = !available;
    }
}

#[async_trait]
impl LedgerOracle for InMemoryLedger {
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<TxId, OracleError> {
        self.state.read().check_available()?;
        self.submit(raw_tx)
    }

    async fn transaction(&self, txid: &TxId) -> Result<Option<LedgerTransaction>, OracleError> {
        let state = self.state.read();
        state.check_available()?;
        Ok(state.view(txid))
    }

    async fn find_by_data(&self, digest: &Digest) -> Result<Vec<LedgerTransaction>, OracleError> {
        let state = self.state.read();
        state.check_available()?;
        Ok(state
            .transactions
            .keys()
            .filter_map(|txid| state.view(txid))
            .filter(|tx| tx.carries_data(digest))
            .collect())
    }

    fn block_notifications(&self) -> Option<watch::Receiver<u64>> {
        Some(self.tip.subscribe())
    }
}
