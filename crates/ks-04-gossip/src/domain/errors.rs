//! Gossip error types.

use std::time::Duration;
use thiserror::Error;

/// A failed call to a peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("peer call timed out after {0:?}")]
    Timeout(Duration),

    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// Non-success status with no defined meaning for the call.
    #[error("peer answered HTTP {0}")]
    Status(u16),

    #[error("malformed peer response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Timeouts, connection failures and 5xx answers are worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Unreachable(_) => true,
            Self::Status(code) => *code >= 500,
            Self::Malformed(_) => false,
        }
    }
}

/// Why a peer record was not merged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GossipError {
    #[error("undecodable peer record: {0}")]
    Decode(String),

    #[error("peer record signature does not verify")]
    InvalidSignature,

    #[error("peer record signed for another address")]
    AddressMismatch,

    /// The local store refused the record.
    #[error("local store rejected record: {0}")]
    Store(String),
}
