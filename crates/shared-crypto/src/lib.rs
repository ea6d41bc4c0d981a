//! # Shared Crypto
//!
//! Pure, stateless primitives behind record verification and payment binding.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256, Keccak-256, HMAC-SHA256 | content digests, addresses, token tags |
//! | `ecdsa` | secp256k1 | record signature verification, keypairs for clients |
//!
//! Verification never panics and never returns an error that would abort the
//! caller's request handling: [`verify`] answers `bool`, fail-closed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;

// Re-exports
pub use ecdsa::{derive_address, verify, verify_auth_wrapper, Secp256k1KeyPair};
pub use errors::CryptoError;
pub use hashing::{digest, hmac_sha256, hmac_sha256_verify, keccak256};
