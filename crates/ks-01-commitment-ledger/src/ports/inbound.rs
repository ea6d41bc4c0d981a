//! # Inbound Port - CommitmentLedgerApi
//!
//! Driving port used by the payment verifier, the metadata store gate and
//! the HTTP façade.
//!
//! | Method | Caller |
//! |--------|--------|
//! | `commit` | façade (explicit commit), store gate (implicit commit) |
//! | `record_payment` | ks-02 payment processing and out-of-band scan |
//! | `check_token` / `redeem` | ks-03 write path |
//! | `tracked_payments` / `apply_depth` / `open_commitments` | ks-02 confirmation watcher |
//! | `sweep` | runtime maintenance task |

use crate::domain::{
    Commitment, LedgerError, LedgerTransition, PaymentObservation, Redemption, SweepReport,
    TokenRejection, TrackedPayment,
};
use shared_types::{Address, CommitmentKey, PaymentRequest, TxId};

/// Answer to a commit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResponse {
    /// Pay this demand, then submit the payment.
    PaymentRequired(PaymentRequest),
    /// Already paid; here is the token again.
    Paid { token: String },
}

/// Primary API of the commitment ledger.
///
/// All methods are synchronous and short: implementations hold their lock
/// only for the duration of one transition.
pub trait CommitmentLedgerApi: Send + Sync {
    /// Open or re-read the commitment for `key`.
    fn commit(&self, key: CommitmentKey, payload_size: Option<usize>) -> CommitResponse;

    /// Current commitment for `key`, if non-terminal.
    fn lookup(&self, key: &CommitmentKey) -> Option<Commitment>;

    /// Mark `key` paid by `observation` and return the minted token.
    fn record_payment(
        &self,
        key: &CommitmentKey,
        observation: PaymentObservation,
    ) -> Result<String, LedgerError>;

    /// Validate without consuming. Returns what `redeem` would return now.
    fn check_token(
        &self,
        token: &str,
        key: &CommitmentKey,
    ) -> Result<Redemption, TokenRejection>;

    /// Consume the token for a write to `address`.
    fn redeem(
        &self,
        token: &str,
        key: &CommitmentKey,
        address: Address,
    ) -> Result<Redemption, TokenRejection>;

    fn tracked_payments(&self) -> Vec<TrackedPayment>;

    fn apply_depth(&self, txid: &TxId, depth: Option<u64>) -> Vec<LedgerTransition>;

    fn open_commitments(&self) -> Vec<Commitment>;

    fn sweep(&self) -> SweepReport;

    /// Confirmations required before propagation.
    fn confirmation_depth(&self) -> u64;

    /// Amount demanded for a payload of `payload_len` bytes.
    fn required_amount(&self, payload_len: usize) -> u64;
}
