//! Payment verification entities.

use shared_types::{BackoffPolicy, Digest, PaymentAck, PaymentOutput, TxId};
use std::time::Duration;

/// A transaction as reported by the ledger oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub txid: TxId,
    pub outputs: Vec<PaymentOutput>,
    /// Confirmations: 0 while only in the unconfirmed pool, 1 once mined.
    pub depth: u64,
}

impl LedgerTransaction {
    /// Whether any data output carries exactly `digest`.
    #[must_use]
    pub fn carries_data(&self, digest: &Digest) -> bool {
        self.outputs.iter().any(|o| match o {
            PaymentOutput::Data { data } => data.as_slice() == digest.as_slice(),
            PaymentOutput::Payment { .. } => false,
        })
    }

    /// Sum of value outputs paying `recipient`.
    #[must_use]
    pub fn paid_to(&self, recipient: &str) -> u64 {
        self.outputs
            .iter()
            .filter_map(|o| match o {
                PaymentOutput::Payment {
                    recipient: r,
                    amount,
                } if r == recipient => Some(*amount),
                _ => None,
            })
            .fold(0u64, u64::saturating_add)
    }

    /// Sum of all value outputs, whoever they pay.
    #[must_use]
    pub fn total_paid(&self) -> u64 {
        self.outputs
            .iter()
            .filter_map(|o| match o {
                PaymentOutput::Payment { amount, .. } => Some(*amount),
                PaymentOutput::Data { .. } => None,
            })
            .fold(0u64, u64::saturating_add)
    }
}

/// Verifier tuning.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Recipient a client payment must pay.
    pub payee: String,
    /// Upper bound on a single oracle call.
    pub oracle_timeout: Duration,
    /// Retry schedule for transient oracle failures on the payment path.
    pub retry: BackoffPolicy,
    /// Watcher wake-up interval when no block notification arrives.
    pub poll_interval: Duration,
    /// Look for payments that reached the ledger without a `/payments` call.
    pub scan_out_of_band: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            payee: "keyserver".to_string(),
            oracle_timeout: Duration::from_secs(10),
            retry: BackoffPolicy::default(),
            poll_interval: Duration::from_secs(5),
            scan_out_of_band: true,
        }
    }
}

/// Successful payment processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub ack: PaymentAck,
    /// Bearer token to present as `Authorization: POP <token>`.
    pub token: String,
    pub txid: TxId,
    pub depth: u64,
}

/// What one watcher cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub polled: usize,
    pub confirmed: usize,
    pub reverted: usize,
    pub released: usize,
    pub cancelled: usize,
    /// Commitments paid out of band during this cycle.
    pub discovered: usize,
    pub oracle_failures: usize,
}
