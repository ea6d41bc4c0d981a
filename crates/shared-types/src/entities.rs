//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Records**: `AddressMetadata`, `Entry`, `Header`, `AuthWrapper`
//! - **Identity**: `Address`, `Digest`
//! - **Payment gating**: `CommitmentKey`, `TxId`
//! - **Networking**: `PeerRecord`, `PeerStatus`
//!
//! Record payloads travel in bincode. The bytes a client submits are stored
//! and replicated verbatim, so a read on any node returns exactly what the
//! signer produced.

use crate::errors::DecodeError;
use crate::MAX_DECODE_BYTES;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 32-byte SHA-256 digest.
pub type Digest = [u8; 32];

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_DECODE_BYTES)
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], DecodeError> {
    bytes.try_into().map_err(|_| DecodeError::Length {
        expected: N,
        actual: bytes.len(),
    })
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse a 32-byte digest from hex text (optional `0x` prefix).
pub fn digest_from_hex(s: &str) -> Result<Digest, DecodeError> {
    fixed(&hex::decode(strip_0x(s.trim()))?)
}

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A 20-byte address derived from a signer's public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Raw address bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Build from a byte slice of exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        fixed(bytes).map(Self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(strip_0x(s.trim()))?;
        Self::from_slice(&bytes)
    }
}

// =============================================================================
// CLUSTER B: RECORDS
// =============================================================================

/// A single name/value header attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// One opaque entry of address metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    pub headers: Vec<Header>,
    pub entry_data: Vec<u8>,
}

/// The signed payload: a timestamped, TTL-bounded list of entries.
///
/// `timestamp` must strictly increase across accepted writes for one address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddressMetadata {
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Lifetime in seconds; must be non-zero.
    pub ttl: u64,
    pub entries: Vec<Entry>,
}

impl AddressMetadata {
    /// Instant after which the record is logically gone.
    #[must_use]
    pub fn expires_at(&self) -> u64 {
        self.timestamp.saturating_add(self.ttl)
    }

    /// `now > timestamp + ttl`.
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.expires_at()
    }

    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        Ok(codec().serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(codec().deserialize(bytes)?)
    }
}

/// Known signature scheme identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SignatureScheme {
    /// ECDSA over secp256k1, compact 64-byte signature over SHA-256(payload).
    Ecdsa = 1,
}

impl SignatureScheme {
    /// Wire identifier.
    #[must_use]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Map a wire identifier to a scheme. Unknown ids yield `None`.
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Ecdsa),
            _ => None,
        }
    }
}

/// Self-certifying envelope around serialized [`AddressMetadata`].
///
/// `scheme` stays a raw byte on the wire so that unknown schemes decode and
/// then fail verification instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthWrapper {
    pub pub_key: Vec<u8>,
    pub serialized_payload: Vec<u8>,
    pub scheme: u8,
    pub signature: Vec<u8>,
}

impl AuthWrapper {
    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        Ok(codec().serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(codec().deserialize(bytes)?)
    }

    /// Decode the embedded metadata payload.
    pub fn metadata(&self) -> Result<AddressMetadata, DecodeError> {
        AddressMetadata::decode(&self.serialized_payload)
    }
}

// =============================================================================
// CLUSTER C: PAYMENT GATING
// =============================================================================

/// Identity of a commitment: `(digest(pub_key), digest(serialized_payload))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitmentKey {
    pub pubkey_digest: Digest,
    pub metadata_digest: Digest,
}

impl CommitmentKey {
    #[must_use]
    pub fn new(pubkey_digest: Digest, metadata_digest: Digest) -> Self {
        Self {
            pubkey_digest,
            metadata_digest,
        }
    }

    /// `pubkey_digest || metadata_digest`, the payment request's merchant data.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.pubkey_digest);
        out[32..].copy_from_slice(&self.metadata_digest);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != 64 {
            return Err(DecodeError::Length {
                expected: 64,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            pubkey_digest: fixed(&bytes[..32])?,
            metadata_digest: fixed(&bytes[32..])?,
        })
    }

    /// Parse the two hex digests of a commit request.
    pub fn from_hex(pubkey_digest: &str, metadata_digest: &str) -> Result<Self, DecodeError> {
        Ok(Self::new(
            digest_from_hex(pubkey_digest)?,
            digest_from_hex(metadata_digest)?,
        ))
    }
}

impl fmt::Display for CommitmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            hex::encode(&self.pubkey_digest[..6]),
            hex::encode(&self.metadata_digest[..6])
        )
    }
}

/// Ledger transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(pub [u8; 32]);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for TxId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        digest_from_hex(s).map(Self)
    }
}

// =============================================================================
// CLUSTER D: NETWORKING
// =============================================================================

/// Last observed reachability of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerStatus {
    #[default]
    Unknown,
    Reachable,
    Unreachable,
}

/// A statically configured peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Base URL, e.g. `http://10.0.0.2:8080`.
    pub url: String,
    pub status: PeerStatus,
    /// Consecutive failed calls since the last success.
    pub consecutive_failures: u32,
    /// Unix seconds of the last successful call.
    pub last_success: Option<u64>,
}

impl PeerRecord {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            status: PeerStatus::Unknown,
            consecutive_failures: 0,
            last_success: None,
        }
    }
}
