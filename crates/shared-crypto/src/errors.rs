//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Public key bytes are not a valid secp256k1 point.
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Secret key bytes are out of range.
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Signature bytes are not a valid compact signature.
    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    /// The signature scheme id is not supported.
    #[error("Unsupported signature scheme: {0}")]
    UnsupportedScheme(u8),

    /// Signature did not verify.
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Key derives a different address than claimed.
    #[error("Public key does not derive address {expected}")]
    AddressMismatch {
        /// Address the caller expected.
        expected: String,
    },
}
