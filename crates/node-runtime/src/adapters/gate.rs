//! # Payment Gate Adapter
//!
//! Implements the metadata store's `PaymentGate` outbound port over the
//! commitment ledger (ks-01) and the payment verifier (ks-02).

use async_trait::async_trait;
use ks_01_commitment_ledger::{CommitResponse, CommitmentLedgerApi, Redemption, TokenRejection};
use ks_02_payment_verification::{ChainProofError, PaymentVerificationApi};
use ks_03_metadata_store::PaymentGate;
use shared_types::{Address, CommitmentKey, Digest, TxId};
use std::sync::Arc;

/// Gate over a ledger `L` and a verifier `P`.
pub struct LedgerGate<L, P>
where
    L: CommitmentLedgerApi,
    P: PaymentVerificationApi,
{
    ledger: Arc<L>,
    verifier: Arc<P>,
}

impl<L, P> LedgerGate<L, P>
where
    L: CommitmentLedgerApi,
    P: PaymentVerificationApi,
{
    pub fn new(ledger: Arc<L>, verifier: Arc<P>) -> Self {
        Self { ledger, verifier }
    }
}

#[async_trait]
impl<L, P> PaymentGate for LedgerGate<L, P>
where
    L: CommitmentLedgerApi,
    P: PaymentVerificationApi,
{
    fn commit(&self, key: CommitmentKey, payload_len: usize) -> CommitResponse {
        self.ledger.commit(key, Some(payload_len))
    }

    fn check_token(
        &self,
        token: &str,
        key: &CommitmentKey,
    ) -> Result<Redemption, TokenRejection> {
        self.ledger.check_token(token, key)
    }

    fn redeem(
        &self,
        token: &str,
        key: &CommitmentKey,
        address: Address,
    ) -> Result<Redemption, TokenRejection> {
        self.ledger.redeem(token, key, address)
    }

    async fn verify_chain_proof(
        &self,
        txid: TxId,
        metadata_digest: &Digest,
        payload_len: usize,
    ) -> Result<u64, ChainProofError> {
        self.verifier
            .verify_chain_proof(txid, metadata_digest, payload_len)
            .await
    }
}
