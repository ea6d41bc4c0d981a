//! Commitment ledger entities.

use super::fees::FeeSchedule;
use shared_types::{
    data_output, Address, CommitmentKey, Digest, PaymentOutput, PaymentRequest, TxId, PAYMENT_URL,
};

/// Lifecycle of a commitment.
///
/// ```text
/// [OPEN] ──paid──→ [PAID_UNCONFIRMED] ──depth ≥ D──→ [CONFIRMED]
///   │  ↑                   │                              │
///   │  └──── reorg ────────┴──────────── reorg ───────────┘
///   │                      │                              │
///   │                      └────────── redeem ────────────┴──→ [REDEEMED]
///   └── window elapsed ──→ [EXPIRED] ←── token unused past its lifetime
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitmentState {
    Open,
    PaidUnconfirmed,
    Confirmed,
    Redeemed,
    Expired,
}

impl CommitmentState {
    /// Terminal states free the key for reuse.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Redeemed | Self::Expired)
    }

    #[must_use]
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::PaidUnconfirmed | Self::Confirmed)
    }
}

/// A payment the verifier matched to a commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentObservation {
    pub txid: TxId,
    /// Value paid to this node.
    pub amount: u64,
    /// 0 = mempool only.
    pub depth: u64,
}

/// An open gating record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    pub key: CommitmentKey,
    pub required_amount: u64,
    /// Payload size the demand was priced for.
    pub payload_size: usize,
    pub created_at: u64,
    pub state: CommitmentState,
    pub payment: Option<PaymentObservation>,
    /// Value of the minted token once paid.
    pub token: Option<String>,
}

impl Commitment {
    /// Build the payment demand for this commitment.
    #[must_use]
    pub fn payment_request(&self, template: &DemandTemplate, window: u64) -> PaymentRequest {
        PaymentRequest {
            network: template.network.clone(),
            time: self.created_at,
            expires: self.created_at.saturating_add(window),
            memo: template.memo.clone(),
            merchant_data: self.key.to_bytes().to_vec(),
            outputs: vec![
                PaymentOutput::Payment {
                    recipient: template.payee.clone(),
                    amount: self.required_amount,
                },
                data_output(&self.key.metadata_digest),
            ],
            payment_url: template.payment_url.clone(),
            required_amount: self.required_amount,
        }
    }
}

/// Static parts of every payment demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemandTemplate {
    pub network: String,
    /// Recipient the payment output must pay.
    pub payee: String,
    pub memo: Option<String>,
    pub payment_url: String,
}

impl Default for DemandTemplate {
    fn default() -> Self {
        Self {
            network: "regtest".to_string(),
            payee: "keyserver".to_string(),
            memo: Some("Thanks for your custom!".to_string()),
            payment_url: PAYMENT_URL.to_string(),
        }
    }
}

/// Ledger tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    pub fees: FeeSchedule,
    /// Seconds an OPEN commitment waits for a payment.
    pub payment_window: u64,
    /// Seconds a minted token stays redeemable.
    pub token_ttl: u64,
    /// Confirmations required before a record may be pushed to peers.
    pub confirmation_depth: u64,
    /// Size assumed when an explicit commit omits `payload_size`.
    pub max_payload_size: usize,
    /// Seconds a redeemed-but-unconfirmed write waits for its confirmations.
    pub pending_push_ttl: u64,
    /// Seconds a used token is remembered so replays report `AlreadyUsed`.
    pub used_token_retention: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fees: FeeSchedule::default(),
            payment_window: 60,
            token_ttl: 600,
            confirmation_depth: 2,
            max_payload_size: 5 * 1024,
            pending_push_ttl: 6 * 60 * 60,
            used_token_retention: 60 * 60,
        }
    }
}

/// Result of a commit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The commitment awaits payment. `created` is false for a repeat request.
    PaymentRequired { commitment: Commitment, created: bool },
    /// Payment was already observed; the minted token is delivered again.
    AlreadyPaid { token: String },
}

/// A redeemed write whose payment must reach the confirmation depth before
/// the record may be pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPropagation {
    pub address: Address,
    pub metadata_digest: Digest,
    pub txid: TxId,
    pub depth: u64,
    pub since: u64,
}

/// Outcome of a successful redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redemption {
    pub txid: TxId,
    pub metadata_digest: Digest,
    /// Best known depth of the paying transaction.
    pub depth: u64,
    /// The payment is already at confirmation depth; push immediately.
    pub ready_to_propagate: bool,
}

/// What the confirmation watcher needs to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedPayment {
    /// A paid commitment whose token is not yet redeemed.
    Commitment { key: CommitmentKey, txid: TxId },
    /// A redeemed write waiting for depth.
    Pending { address: Address, txid: TxId },
}

impl TrackedPayment {
    #[must_use]
    pub fn txid(&self) -> TxId {
        match self {
            Self::Commitment { txid, .. } | Self::Pending { txid, .. } => *txid,
        }
    }
}

/// State changes produced by applying a depth observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerTransition {
    /// PAID_UNCONFIRMED → CONFIRMED.
    Confirmed {
        key: CommitmentKey,
        txid: TxId,
        depth: u64,
    },
    /// Paid commitment reverted to OPEN after its payment vanished.
    Reverted { key: CommitmentKey, txid: TxId },
    /// A redeemed write reached depth and may be pushed.
    ReadyToPropagate {
        address: Address,
        metadata_digest: Digest,
        txid: TxId,
    },
    /// A redeemed write's payment vanished before reaching depth.
    PropagationCancelled { address: Address, txid: TxId },
}

/// Counts from a garbage-collection sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub commitments: usize,
    pub tokens: usize,
    pub pending: usize,
}

impl SweepReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commitments == 0 && self.tokens == 0 && self.pending == 0
    }
}
