//! Metadata store errors.
//!
//! | Variant | Class | HTTP |
//! |---------|-------|------|
//! | `Decode`, `InvalidSignature`, `AddressMismatch`, `InvalidTtl`, `FutureTimestamp`, `Expired` | validation | 400 |
//! | `TooLarge` | validation | 413 |
//! | `PaymentRequired`, `ProofRejected` | payment required | 402 |
//! | `Forbidden` | token binding | 403 |
//! | `Conflict` | stale write | 409 |
//! | `Unavailable` | transient, including a chain proof not yet confirmed here | 503 |
//! | `Backend` | storage fault | 500 |

use ks_01_commitment_ledger::TokenRejection;
use shared_types::PaymentRequest;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("malformed record: {0}")]
    Decode(String),

    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    /// Pay this demand, then retry with the token.
    #[error("payment required")]
    PaymentRequired(Box<PaymentRequest>),

    /// A chain proof did not show a confirmed, sufficient payment.
    #[error("chain proof rejected: {0}")]
    ProofRejected(String),

    #[error("token rejected: {0}")]
    Forbidden(TokenRejection),

    #[error("signature does not verify")]
    InvalidSignature,

    #[error("public key does not derive the target address")]
    AddressMismatch,

    #[error("ttl must be positive")]
    InvalidTtl,

    #[error("timestamp {timestamp} is ahead of the clock")]
    FutureTimestamp { timestamp: u64 },

    #[error("record already expired at {expired_at}")]
    Expired { expired_at: u64 },

    /// A record with an equal or newer timestamp is stored.
    #[error("stored record at {stored} is not older than {incoming}")]
    Conflict { stored: u64, incoming: u64 },

    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    #[error("storage backend: {0}")]
    Backend(String),
}

impl StoreError {
    /// Metric label.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::TooLarge { .. } => "too_large",
            Self::PaymentRequired(_) => "payment_required",
            Self::ProofRejected(_) => "proof_rejected",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidSignature => "signature",
            Self::AddressMismatch => "address",
            Self::InvalidTtl | Self::FutureTimestamp { .. } | Self::Expired { .. } => "timestamp",
            Self::Conflict { .. } => "conflict",
            Self::Unavailable(_) => "unavailable",
            Self::Backend(_) => "backend",
        }
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        Self::Backend(err.to_string())
    }
}
