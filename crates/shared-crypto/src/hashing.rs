//! # Hashing
//!
//! | Function | Algorithm | Used for |
//! |----------|-----------|----------|
//! | [`digest`] | SHA-256 | pubkey/metadata digests, payment data outputs |
//! | [`keccak256`] | Keccak-256 | address derivation |
//! | [`hmac_sha256`] | HMAC-SHA256 | token authentication tags |

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sha3::{Digest as _, Keccak256};
use shared_types::Digest;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 content digest. The same algorithm is used wherever digests are
/// compared.
pub fn digest(bytes: &[u8]) -> Digest {
    Sha256::digest(bytes).into()
}

/// Keccak-256 hash.
pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    Keccak256::digest(bytes).into()
}

/// HMAC-SHA256 over the concatenation of `parts`.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    // HMAC accepts keys of any length.
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(key) else {
        return [0u8; 32];
    };
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

/// Constant-time check of an HMAC-SHA256 tag.
pub fn hmac_sha256_verify(key: &[u8], parts: &[&[u8]], tag: &[u8]) -> bool {
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(key) else {
        return false;
    };
    for part in parts {
        mac.update(part);
    }
    mac.verify_slice(tag).is_ok()
}
