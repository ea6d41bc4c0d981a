//! Response types. One variant per outcome kind, so a handler can never
//! return a half success.

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use shared_types::{Credential, Digest, PaymentAck, PaymentRequest, PeerRecord};

const OCTET_STREAM: &str = "application/octet-stream";

/// Answer to `POST /commit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitReply {
    /// 402 with the demand.
    PaymentRequired(PaymentRequest),
    /// 200 with the already minted token.
    Paid { token: String },
}

/// Body of a 200 commit answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBody {
    pub token: String,
}

impl IntoResponse for CommitReply {
    fn into_response(self) -> Response {
        match self {
            Self::PaymentRequired(request) => {
                (StatusCode::PAYMENT_REQUIRED, Json(request)).into_response()
            }
            Self::Paid { token } => (
                StatusCode::OK,
                [(AUTHORIZATION, Credential::Token(token.clone()).header_value())],
                Json(TokenBody { token }),
            )
                .into_response(),
        }
    }
}

/// Answer to an accepted `POST /payments`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReply {
    pub token: String,
    pub ack: PaymentAck,
}

impl IntoResponse for PaymentReply {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(AUTHORIZATION, Credential::Token(self.token).header_value())],
            Json(self.ack),
        )
            .into_response()
    }
}

/// Body of an accepted `PUT /keys/{addr}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub address: String,
    pub timestamp: u64,
    /// Hex SHA-256 of the stored payload.
    pub metadata_digest: String,
    /// Whether peers are being pushed to right away.
    pub propagating: bool,
}

/// Answer to `GET /keys/{addr}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordReply {
    /// The stored `AuthWrapper` bytes, verbatim.
    Raw(Vec<u8>),
    /// SHA-256 of those bytes (`?digest=true`).
    Digest(Digest),
}

impl IntoResponse for RecordReply {
    fn into_response(self) -> Response {
        let body = match self {
            Self::Raw(raw) => raw,
            Self::Digest(digest) => digest.to_vec(),
        };
        (StatusCode::OK, [(CONTENT_TYPE, OCTET_STREAM)], body).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerList {
    pub peers: Vec<PeerRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub records: usize,
    pub peers: usize,
}
