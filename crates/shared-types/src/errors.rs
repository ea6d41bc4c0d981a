//! # Error Types
//!
//! Decoding errors for the wire formats defined in this crate.

use thiserror::Error;

/// Errors raised while decoding keyserver wire data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Bincode payload could not be decoded.
    #[error("malformed binary payload: {0}")]
    Binary(String),

    /// Hex text was not valid hex.
    #[error("invalid hex: {0}")]
    Hex(String),

    /// Decoded value had the wrong length.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    /// Authorization header was not a recognised credential.
    #[error("unrecognised credential: {0}")]
    Credential(String),
}

impl From<hex::FromHexError> for DecodeError {
    fn from(e: hex::FromHexError) -> Self {
        Self::Hex(e.to_string())
    }
}

impl From<bincode::Error> for DecodeError {
    fn from(e: bincode::Error) -> Self {
        Self::Binary(e.to_string())
    }
}
