//! Pure write validation, in the order the store applies it.
//!
//! 1. [`decode_write`] - wrapper and payload decode, payload size
//! 2. (authorization, done by the service)
//! 3. [`verify_signer`] - signature, then address binding
//! 4. [`check_freshness`] - `ttl > 0`, not ahead of the clock, not expired
//! 5. [`check_last_writer`] - expired stored records never win

use super::entities::StoredRecord;
use super::errors::StoreError;
use shared_crypto::{digest, verify_auth_wrapper, CryptoError};
use shared_types::{Address, AddressMetadata, AuthWrapper, CommitmentKey};

/// A decoded, not yet verified write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedWrite {
    pub wrapper: AuthWrapper,
    pub metadata: AddressMetadata,
    /// `(digest(pub_key), digest(serialized_payload))`.
    pub key: CommitmentKey,
}

impl DecodedWrite {
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.wrapper.serialized_payload.len()
    }
}

pub fn decode_write(raw: &[u8], max_payload_size: usize) -> Result<DecodedWrite, StoreError> {
    let wrapper = AuthWrapper::decode(raw).map_err(|e| StoreError::Decode(e.to_string()))?;
    let size = wrapper.serialized_payload.len();
    if size > max_payload_size {
        return Err(StoreError::TooLarge {
            size,
            max: max_payload_size,
        });
    }
    let metadata = wrapper
        .metadata()
        .map_err(|e| StoreError::Decode(e.to_string()))?;
    let key = CommitmentKey::new(digest(&wrapper.pub_key), digest(&wrapper.serialized_payload));
    Ok(DecodedWrite {
        wrapper,
        metadata,
        key,
    })
}

pub fn verify_signer(write: &DecodedWrite, address: &Address) -> Result<(), StoreError> {
    match verify_auth_wrapper(&write.wrapper, address) {
        Ok(()) => Ok(()),
        Err(CryptoError::AddressMismatch { .. }) => Err(StoreError::AddressMismatch),
        Err(_) => Err(StoreError::InvalidSignature),
    }
}

pub fn check_freshness(
    metadata: &AddressMetadata,
    now: u64,
    clock_skew: u64,
) -> Result<(), StoreError> {
    if metadata.ttl == 0 {
        return Err(StoreError::InvalidTtl);
    }
    if metadata.timestamp > now.saturating_add(clock_skew) {
        return Err(StoreError::FutureTimestamp {
            timestamp: metadata.timestamp,
        });
    }
    if metadata.is_expired(now) {
        return Err(StoreError::Expired {
            expired_at: metadata.expires_at(),
        });
    }
    Ok(())
}

/// Last-writer-wins against the stored record. An expired stored record is
/// treated as absent, so any fresh write replaces it.
pub fn check_last_writer(
    existing: Option<&StoredRecord>,
    incoming: u64,
    now: u64,
) -> Result<(), StoreError> {
    match existing {
        Some(record) if !record.is_expired(now) && record.timestamp() >= incoming => {
            Err(StoreError::Conflict {
                stored: record.timestamp(),
                incoming,
            })
        }
        _ => Ok(()),
    }
}
