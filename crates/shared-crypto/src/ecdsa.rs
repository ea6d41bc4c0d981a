//! # ECDSA Signatures (secp256k1)
//!
//! Verification of self-signed record payloads and address derivation.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces for signing
//! - Low-S only: high-S signatures are rejected by `k256` during verification
//! - Every malformed input is reported as a failure, never a panic
//!
//! ## Address Derivation
//!
//! ```text
//! pub_key (33 or 65 bytes SEC1) ──▶ uncompressed point ──▶ drop 0x04 tag
//!                                                     │
//!                                 keccak256(64 bytes) ▼
//!                                 address = hash[12..32]
//! ```

use crate::hashing::keccak256;
use crate::CryptoError;
use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use shared_types::{Address, AddressMetadata, AuthWrapper, DecodeError, SignatureScheme};

/// Verify `signature` over `message` with `pub_key` under `scheme`.
///
/// Fails closed: unknown schemes, malformed keys and malformed signatures all
/// return `false`.
pub fn verify(pub_key: &[u8], message: &[u8], signature: &[u8], scheme: u8) -> bool {
    match SignatureScheme::from_id(scheme) {
        Some(SignatureScheme::Ecdsa) => verify_ecdsa(pub_key, message, signature).is_ok(),
        None => false,
    }
}

fn verify_ecdsa(pub_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    let verifying_key =
        VerifyingKey::from_sec1_bytes(pub_key).map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignatureFormat)?;
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}

/// Derive the address of a SEC1-encoded secp256k1 public key.
pub fn derive_address(pub_key: &[u8]) -> Result<Address, CryptoError> {
    let verifying_key =
        VerifyingKey::from_sec1_bytes(pub_key).map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(address_of(&verifying_key))
}

fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    Address(out)
}

/// Full self-certification check of a wrapper against the address it is
/// stored under: signature first, then address binding.
pub fn verify_auth_wrapper(wrapper: &AuthWrapper, address: &Address) -> Result<(), CryptoError> {
    if SignatureScheme::from_id(wrapper.scheme).is_none() {
        return Err(CryptoError::UnsupportedScheme(wrapper.scheme));
    }
    if !verify(
        &wrapper.pub_key,
        &wrapper.serialized_payload,
        &wrapper.signature,
        wrapper.scheme,
    ) {
        return Err(CryptoError::SignatureVerificationFailed);
    }
    let derived = derive_address(&wrapper.pub_key)?;
    if derived != *address {
        return Err(CryptoError::AddressMismatch {
            expected: address.to_string(),
        });
    }
    Ok(())
}

/// secp256k1 keypair used by clients (and tests) to sign metadata.
#[derive(Debug)]
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate a random keypair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Create from secret key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Compressed SEC1 public key (33 bytes).
    pub fn public_key(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_sec1_bytes().to_vec()
    }

    /// Address of this keypair.
    pub fn address(&self) -> Address {
        address_of(self.signing_key.verifying_key())
    }

    /// Compact 64-byte `r || s` signature over SHA-256(message).
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let sig: Signature = self.signing_key.sign(message);
        sig.to_bytes().into()
    }

    /// Serialize and sign metadata into a wrapper ready for upload.
    pub fn sign_metadata(&self, metadata: &AddressMetadata) -> Result<AuthWrapper, DecodeError> {
        let serialized_payload = metadata.encode()?;
        let signature = self.sign(&serialized_payload).to_vec();
        Ok(AuthWrapper {
            pub_key: self.public_key(),
            serialized_payload,
            scheme: SignatureScheme::Ecdsa.id(),
            signature,
        })
    }
}
