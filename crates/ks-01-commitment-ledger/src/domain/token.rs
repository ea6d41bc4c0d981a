//! # Token Issuer
//!
//! Bearer tokens are self-authenticating and bound to one commitment:
//!
//! ```text
//! token = hex( nonce[16] || HMAC-SHA256(secret, pubkey_digest || metadata_digest || nonce) )
//! ```
//!
//! The MAC makes forgery infeasible without the node secret. Single use is
//! enforced by the ledger, which tracks each issued nonce and its `used` flag.

use rand::RngCore;
use shared_crypto::{hmac_sha256, hmac_sha256_verify};
use shared_types::CommitmentKey;

use super::errors::TokenRejection;

const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 32;

/// Ledger-side identifier of a token (its nonce).
pub type TokenId = [u8; NONCE_LEN];

/// An issued token and its binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Opaque bearer value handed to the client.
    pub value: String,
    pub id: TokenId,
    /// Commitment the token was minted for.
    pub key: CommitmentKey,
    pub expires_at: u64,
    pub used: bool,
}

impl Token {
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.expires_at
    }
}

/// Mints and authenticates tokens with a node-local secret.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: [u8; 32],
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: [u8; 32]) -> Self {
        Self { secret }
    }

    /// Issuer with a fresh random secret. Tokens do not survive restarts.
    #[must_use]
    pub fn random() -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self { secret }
    }

    fn tag(&self, key: &CommitmentKey, id: &TokenId) -> [u8; 32] {
        hmac_sha256(
            &self.secret,
            &[key.pubkey_digest.as_slice(), key.metadata_digest.as_slice(), id.as_slice()],
        )
    }

    /// Mint a new, unused token for `key`.
    pub fn mint(&self, key: CommitmentKey, expires_at: u64) -> Token {
        let mut id = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut id);
        let tag = self.tag(&key, &id);

        let mut raw = Vec::with_capacity(NONCE_LEN + TAG_LEN);
        raw.extend_from_slice(&id);
        raw.extend_from_slice(&tag);

        Token {
            value: hex::encode(raw),
            id,
            key,
            expires_at,
            used: false,
        }
    }

    /// Split a presented token into `(id, tag)`.
    pub fn parse(value: &str) -> Result<(TokenId, [u8; TAG_LEN]), TokenRejection> {
        let value = value.trim();
        if value.is_empty() {
            return Err(TokenRejection::Missing);
        }
        let raw = hex::decode(value).map_err(|_| TokenRejection::Malformed)?;
        if raw.len() != NONCE_LEN + TAG_LEN {
            return Err(TokenRejection::Malformed);
        }
        let mut id = [0u8; NONCE_LEN];
        let mut tag = [0u8; TAG_LEN];
        id.copy_from_slice(&raw[..NONCE_LEN]);
        tag.copy_from_slice(&raw[NONCE_LEN..]);
        Ok((id, tag))
    }

    /// Constant-time check that `tag` was produced by this issuer for `key`.
    #[must_use]
    pub fn authenticate(&self, key: &CommitmentKey, id: &TokenId, tag: &[u8]) -> bool {
        hmac_sha256_verify(
            &self.secret,
            &[key.pubkey_digest.as_slice(), key.metadata_digest.as_slice(), id.as_slice()],
            tag,
        )
    }
}
