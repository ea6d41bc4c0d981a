//! Self-certification of peer records.
//!
//! A pulled record needs no payment proof: it is accepted when its signature
//! verifies and its public key derives the requested address.

use super::errors::GossipError;
use shared_crypto::{verify_auth_wrapper, CryptoError};
use shared_types::{Address, AddressMetadata, AuthWrapper};

pub fn verify_peer_record(raw: &[u8], address: &Address) -> Result<AddressMetadata, GossipError> {
    let wrapper = AuthWrapper::decode(raw).map_err(|e| GossipError::Decode(e.to_string()))?;
    verify_auth_wrapper(&wrapper, address).map_err(|e| match e {
        CryptoError::AddressMismatch { .. } => GossipError::AddressMismatch,
        _ => GossipError::InvalidSignature,
    })?;
    wrapper
        .metadata()
        .map_err(|e| GossipError::Decode(e.to_string()))
}
