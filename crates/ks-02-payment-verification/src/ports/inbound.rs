//! # Inbound Port - PaymentVerificationApi
//!
//! | Method | Caller |
//! |--------|--------|
//! | `process_payment` | façade `POST /payments` |
//! | `verify_chain_proof` | ks-03 write path for peer pushes |

use crate::domain::{ChainProofError, PaymentError, PaymentReceipt};
use async_trait::async_trait;
use shared_types::{Digest, Payment, TxId};

#[async_trait]
pub trait PaymentVerificationApi: Send + Sync {
    /// Broadcast the payment's transactions, match one against the
    /// commitment named by its merchant data, and mint a token.
    async fn process_payment(&self, payment: Payment) -> Result<PaymentReceipt, PaymentError>;

    /// Check that `txid` is a confirmed payment for a payload with digest
    /// `metadata_digest` and length `payload_len`. Returns its depth.
    async fn verify_chain_proof(
        &self,
        txid: TxId,
        metadata_digest: &Digest,
        payload_len: usize,
    ) -> Result<u64, ChainProofError>;
}
