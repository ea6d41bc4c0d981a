//! Payment verification errors.

use ks_01_commitment_ledger::LedgerError;
use shared_types::CommitmentKey;
use std::time::Duration;
use thiserror::Error;

/// Failures talking to the ledger oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The call did not complete in time.
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    /// Transport failure or node unavailable.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The node refused the request (e.g. an invalid transaction).
    #[error("rejected by ledger node: {0}")]
    Rejected(String),

    /// The node answered with something we could not interpret.
    #[error("unexpected oracle response: {0}")]
    Malformed(String),
}

impl OracleError {
    /// Transient failures are retried; the rest are final.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }
}

/// Why a submitted payment did not unlock a commitment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// Undecodable merchant data or transactions.
    #[error("malformed payment: {0}")]
    Malformed(String),

    /// No open commitment for the merchant data (never opened or expired).
    #[error("no open commitment for {0}")]
    UnknownCommitment(CommitmentKey),

    /// No submitted transaction carries the commitment's digest.
    #[error("no transaction carries the committed digest")]
    WrongDigest { key: CommitmentKey },

    /// The matching transaction pays too little.
    #[error("insufficient payment: required {required}, paid {paid}")]
    Insufficient {
        key: CommitmentKey,
        required: u64,
        paid: u64,
    },

    /// Broadcast succeeded but the oracle does not report the transaction.
    #[error("payment not yet observed")]
    NotObserved { key: CommitmentKey },

    /// The oracle could not be reached within the retry budget.
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl PaymentError {
    /// Commitment to re-issue a demand for, when the answer is "pay again".
    #[must_use]
    pub fn demand_key(&self) -> Option<CommitmentKey> {
        match self {
            Self::WrongDigest { key }
            | Self::Insufficient { key, .. }
            | Self::NotObserved { key } => Some(*key),
            _ => None,
        }
    }

    /// Metric label.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::UnknownCommitment(_) => "unknown_commitment",
            Self::WrongDigest { .. } => "wrong_digest",
            Self::Insufficient { .. } => "insufficient",
            Self::NotObserved { .. } => "not_observed",
            Self::Oracle(_) => "oracle_error",
        }
    }

    pub(crate) fn from_ledger(key: CommitmentKey, err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientPayment { required, paid } => Self::Insufficient {
                key,
                required,
                paid,
            },
            LedgerError::UnknownCommitment(k) => Self::UnknownCommitment(k),
            LedgerError::Token(_) => Self::UnknownCommitment(key),
        }
    }
}

/// Why a peer's chain proof does not authorize a push.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainProofError {
    #[error("transaction not found")]
    NotFound,

    #[error("transaction at depth {depth}, {required} required")]
    Unconfirmed { depth: u64, required: u64 },

    #[error("transaction does not carry the payload digest")]
    WrongDigest,

    #[error("transaction pays {paid}, {required} required")]
    Insufficient { required: u64, paid: u64 },

    #[error(transparent)]
    Oracle(#[from] OracleError),
}
