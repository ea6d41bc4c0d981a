//! # Protocol Messages
//!
//! JSON messages exchanged on the commit and payment paths, modelled after a
//! BIP70-style payment protocol:
//!
//! ```text
//! client                         keyserver
//!   │  CommitRequest ──────────────▶ │
//!   │ ◀──────────── PaymentRequest   │  (402)
//!   │  Payment ────────────────────▶ │
//!   │ ◀──── PaymentAck + POP token   │  (200, Authorization header)
//! ```
//!
//! Byte fields are hex strings on the wire.

use crate::entities::{CommitmentKey, Digest, TxId};
use crate::errors::DecodeError;
use serde::{Deserialize, Serialize};
use serde_with::hex::Hex;
use serde_with::serde_as;

/// Authorization scheme for a bearer token minted by this node.
pub const TOKEN_AUTH_SCHEME: &str = "POP";

/// Authorization scheme for a chain proof (txid) used between peers.
pub const CHAIN_PROOF_AUTH_SCHEME: &str = "POP-TX";

/// Relative URL clients post payments to.
pub const PAYMENT_URL: &str = "/payments";

/// Explicit commit request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Hex SHA-256 of the public key.
    pub pubkey_digest: String,
    /// Hex SHA-256 of the serialized metadata.
    pub metadata_digest: String,
    /// Size of the payload that will be written, used to price the demand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<usize>,
}

impl CommitRequest {
    pub fn key(&self) -> Result<CommitmentKey, DecodeError> {
        CommitmentKey::from_hex(&self.pubkey_digest, &self.metadata_digest)
    }
}

/// One output a paying transaction must contain.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentOutput {
    /// Value transfer to the keyserver operator.
    Payment { recipient: String, amount: u64 },
    /// Data carrier output holding the metadata digest.
    Data {
        #[serde_as(as = "Hex")]
        data: Vec<u8>,
    },
}

/// Payment demand returned with `402 Payment Required`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub network: String,
    /// Unix seconds the demand was created.
    pub time: u64,
    /// Unix seconds after which the demand is void.
    pub expires: u64,
    pub memo: Option<String>,
    /// `pubkey_digest || metadata_digest`, echoed back in the [`Payment`].
    #[serde_as(as = "Hex")]
    pub merchant_data: Vec<u8>,
    pub outputs: Vec<PaymentOutput>,
    pub payment_url: String,
    pub required_amount: u64,
}

impl PaymentRequest {
    /// The metadata digest the paying transaction must carry.
    #[must_use]
    pub fn data_output(&self) -> Option<&[u8]> {
        self.outputs.iter().find_map(|o| match o {
            PaymentOutput::Data { data } => Some(data.as_slice()),
            PaymentOutput::Payment { .. } => None,
        })
    }
}

/// Payment submission: raw transactions plus the merchant data of the demand.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    #[serde_as(as = "Hex")]
    pub merchant_data: Vec<u8>,
    #[serde_as(as = "Vec<Hex>")]
    pub transactions: Vec<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl Payment {
    /// The commitment this payment is for.
    pub fn commitment_key(&self) -> Result<CommitmentKey, DecodeError> {
        CommitmentKey::from_bytes(&self.merchant_data)
    }
}

/// Acknowledgement of an accepted payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAck {
    pub payment: Payment,
    pub memo: Option<String>,
}

/// Write credential parsed from an `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// `POP <token>`
    Token(String),
    /// `POP-TX <txid>`
    ChainProof(TxId),
}

impl Credential {
    /// Parse an `Authorization` header value.
    pub fn parse(value: &str) -> Result<Self, DecodeError> {
        let (scheme, rest) = value
            .trim()
            .split_once(' ')
            .ok_or_else(|| DecodeError::Credential(value.to_string()))?;
        let rest = rest.trim();
        match scheme {
            TOKEN_AUTH_SCHEME if !rest.is_empty() => Ok(Self::Token(rest.to_string())),
            CHAIN_PROOF_AUTH_SCHEME => Ok(Self::ChainProof(rest.parse()?)),
            _ => Err(DecodeError::Credential(value.to_string())),
        }
    }

    /// Render as an `Authorization` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        match self {
            Self::Token(t) => format!("{TOKEN_AUTH_SCHEME} {t}"),
            Self::ChainProof(txid) => format!("{CHAIN_PROOF_AUTH_SCHEME} {txid}"),
        }
    }
}

/// Build the data output for a digest.
#[must_use]
pub fn data_output(digest: &Digest) -> PaymentOutput {
    PaymentOutput::Data {
        data: digest.to_vec(),
    }
}
