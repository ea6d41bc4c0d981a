//! # API Errors
//!
//! Every failure a handler can return, with its status code:
//!
//! | Variant | Status | Body |
//! |---------|--------|------|
//! | `BadRequest` | 400 | `{"error": ..}` |
//! | `PaymentRequired` | 402 | `PaymentRequest` JSON |
//! | `ProofRejected` | 402 | `{"error": ..}` |
//! | `Forbidden` | 403 | `{"error": ..}` |
//! | `NotFound` | 404 | `{"error": ..}` |
//! | `Conflict` | 409 | `{"error": ..}` |
//! | `PayloadTooLarge` | 413 | `{"error": ..}` |
//! | `Unavailable` | 503 | `{"error": ..}` |
//! | `Internal` | 500 | `{"error": ..}` |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ks_02_payment_verification::PaymentError;
use ks_03_metadata_store::StoreError;
use serde::{Deserialize, Serialize};
use shared_types::PaymentRequest;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// Pay the demand, then retry.
    #[error("payment required")]
    PaymentRequired(Box<PaymentRequest>),

    /// A peer push whose payment proof did not hold up.
    #[error("{0}")]
    ProofRejected(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

/// JSON body of every non-402 error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PaymentRequired(_) | Self::ProofRejected(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::PaymentRequired(request) => (status, Json(*request)).into_response(),
            Self::Internal(message) => {
                error!("[ks-05] Internal error: {}", message);
                (
                    status,
                    Json(ErrorBody {
                        error: "internal error".to_string(),
                    }),
                )
                    .into_response()
            }
            other => (
                status,
                Json(ErrorBody {
                    error: other.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PaymentRequired(request) => Self::PaymentRequired(request),
            StoreError::ProofRejected(_) => Self::ProofRejected(err.to_string()),
            StoreError::Forbidden(_) => Self::Forbidden(err.to_string()),
            StoreError::Conflict { .. } => Self::Conflict(err.to_string()),
            StoreError::TooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            StoreError::Unavailable(_) => Self::Unavailable(err.to_string()),
            StoreError::Backend(_) => Self::Internal(err.to_string()),
            StoreError::Decode(_)
            | StoreError::InvalidSignature
            | StoreError::AddressMismatch
            | StoreError::InvalidTtl
            | StoreError::FutureTimestamp { .. }
            | StoreError::Expired { .. } => Self::BadRequest(err.to_string()),
        }
    }
}

/// Payment failures that do not come with a fresh demand.
///
/// `WrongDigest`, `Insufficient` and `NotObserved` are answered with the
/// commitment's demand by the handler, which has the ledger at hand.
impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match &err {
            PaymentError::Malformed(_) => Self::BadRequest(err.to_string()),
            PaymentError::UnknownCommitment(_) => Self::NotFound(err.to_string()),
            PaymentError::Oracle(e) if e.is_transient() => Self::Unavailable(err.to_string()),
            PaymentError::Oracle(_) => Self::BadRequest(err.to_string()),
            PaymentError::WrongDigest { .. }
            | PaymentError::Insufficient { .. }
            | PaymentError::NotObserved { .. } => Self::ProofRejected(err.to_string()),
        }
    }
}
