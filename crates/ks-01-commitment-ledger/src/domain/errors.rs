//! Ledger error types.

use shared_types::CommitmentKey;
use thiserror::Error;

/// Why a presented token cannot authorize a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    /// No token was presented.
    #[error("no token presented")]
    Missing,

    /// Token text is not a well-formed token.
    #[error("malformed token")]
    Malformed,

    /// Token was never issued here, was revoked, or has been forgotten.
    #[error("unknown token")]
    Unknown,

    /// Token lifetime elapsed before redemption.
    #[error("token expired")]
    Expired,

    /// Token was already consumed by an earlier write.
    #[error("token already redeemed")]
    AlreadyUsed,

    /// Token pays for a different payload than the one submitted.
    #[error("token bound to a different payload digest")]
    DigestMismatch,

    /// Token was issued for a different public key.
    #[error("token bound to a different public key")]
    IdentityMismatch,
}

/// Commitment ledger errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No open commitment exists for the key (never opened or expired).
    #[error("no open commitment for {0}")]
    UnknownCommitment(CommitmentKey),

    /// The observed payment is below the demand.
    #[error("insufficient payment: required {required}, paid {paid}")]
    InsufficientPayment { required: u64, paid: u64 },

    /// Token validation failed.
    #[error(transparent)]
    Token(#[from] TokenRejection),
}
