//! Pure checks of oracle transactions against commitments and chain proofs.

use super::entities::LedgerTransaction;
use super::errors::ChainProofError;
use shared_types::Digest;

/// Why a transaction does not satisfy a commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    MissingData,
    Underpaid { required: u64, paid: u64 },
}

/// Check that `tx` carries `digest` and pays `payee` at least `required`.
///
/// Returns the amount paid to `payee`.
pub fn match_payment(
    tx: &LedgerTransaction,
    digest: &Digest,
    payee: &str,
    required: u64,
) -> Result<u64, Mismatch> {
    if !tx.carries_data(digest) {
        return Err(Mismatch::MissingData);
    }
    let paid = tx.paid_to(payee);
    if paid < required {
        return Err(Mismatch::Underpaid { required, paid });
    }
    Ok(paid)
}

/// Check a peer's chain proof: buried at least `required_depth` deep, carries
/// `digest`, and pays at least `min_amount` to anyone.
pub fn check_chain_proof(
    tx: &LedgerTransaction,
    digest: &Digest,
    required_depth: u64,
    min_amount: u64,
) -> Result<u64, ChainProofError> {
    if tx.depth < required_depth {
        return Err(ChainProofError::Unconfirmed {
            depth: tx.depth,
            required: required_depth,
        });
    }
    if !tx.carries_data(digest) {
        return Err(ChainProofError::WrongDigest);
    }
    let paid = tx.total_paid();
    if paid < min_amount {
        return Err(ChainProofError::Insufficient {
            required: min_amount,
            paid,
        });
    }
    Ok(tx.depth)
}
