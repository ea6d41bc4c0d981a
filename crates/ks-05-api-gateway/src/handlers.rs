//! Request handlers. Each one parses, delegates to a subsystem port and
//! maps the outcome; none of them holds business rules.

use crate::domain::{
    ApiError, CommitReply, HealthResponse, PaymentReply, PeerList, RecordReply, WriteResponse,
};
use crate::router::AppState;
use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, MAX_FORWARDS};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use ks_01_commitment_ledger::CommitResponse;
use ks_02_payment_verification::PaymentError;
use ks_03_metadata_store::WriteAuthorization;
use serde::Deserialize;
use shared_crypto::digest;
use shared_types::{Address, CommitRequest, CommitmentKey, Credential, Payment};
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
pub struct ReadQuery {
    #[serde(default)]
    pub digest: bool,
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid address {raw:?}: {e}")))
}

/// Credential from `Authorization`. An unparseable value is passed on as a
/// bearer token so the ledger reports it as malformed.
fn write_authorization(headers: &HeaderMap) -> Result<WriteAuthorization, ApiError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(WriteAuthorization::None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("non-ASCII Authorization header".to_string()))?;
    Ok(match Credential::parse(value) {
        Ok(credential) => Some(credential).into(),
        Err(_) => WriteAuthorization::Bearer(value.to_string()),
    })
}

/// A read may fall through to peers unless the caller forbids forwarding.
fn may_forward(headers: &HeaderMap) -> bool {
    headers
        .get(MAX_FORWARDS)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u32>().ok())
        .map_or(true, |hops| hops > 0)
}

fn commit_reply(response: CommitResponse) -> CommitReply {
    match response {
        CommitResponse::PaymentRequired(request) => CommitReply::PaymentRequired(request),
        CommitResponse::Paid { token } => CommitReply::Paid { token },
    }
}

/// `POST /commit`
pub async fn commit(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<CommitReply, ApiError> {
    let request: CommitRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid commit request: {e}")))?;
    let key = request
        .key()
        .map_err(|e| ApiError::BadRequest(format!("invalid digest: {e}")))?;
    if let Some(size) = request.payload_size {
        if size > state.config.max_payload_size {
            return Err(ApiError::PayloadTooLarge(format!(
                "payload of {size} bytes exceeds the {} byte limit",
                state.config.max_payload_size
            )));
        }
    }
    Ok(commit_reply(state.ledger.commit(key, request.payload_size)))
}

/// `PUT /keys/{addr}`
pub async fn put_record(
    State(state): State<AppState>,
    Path(address): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let address = parse_address(&address)?;
    let authorization = write_authorization(&headers)?;
    let receipt = state
        .store
        .put(address, body.to_vec(), authorization)
        .await?;
    Ok(Json(WriteResponse {
        address: receipt.address.to_string(),
        timestamp: receipt.timestamp,
        metadata_digest: hex::encode(receipt.metadata_digest),
        propagating: receipt.propagating,
    }))
}

/// `GET /keys/{addr}`
pub async fn get_record(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<ReadQuery>,
    headers: HeaderMap,
) -> Result<RecordReply, ApiError> {
    let address = parse_address(&address)?;
    let raw = match state.store.get(&address).await? {
        Some(record) => record.raw,
        None if may_forward(&headers) => state
            .gossip
            .pull(&address)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("no record for {address}")))?,
        None => {
            debug!("[ks-05] Miss for {} with forwarding disabled", address);
            return Err(ApiError::NotFound(format!("no record for {address}")));
        }
    };
    Ok(if query.digest {
        RecordReply::Digest(digest(&raw))
    } else {
        RecordReply::Raw(raw)
    })
}

/// Re-issue the outstanding demand for `key` without repricing it.
fn outstanding_demand(state: &AppState, key: CommitmentKey) -> Option<CommitReply> {
    let commitment = state.ledger.lookup(&key)?;
    Some(commit_reply(
        state.ledger.commit(key, Some(commitment.payload_size)),
    ))
}

/// `POST /payments`
pub async fn submit_payment(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<axum::response::Response, ApiError> {
    let payment: Payment = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid payment: {e}")))?;
    match state.payments.process_payment(payment).await {
        Ok(receipt) => Ok(PaymentReply {
            token: receipt.token,
            ack: receipt.ack,
        }
        .into_response()),
        Err(err) => match err.demand_key() {
            Some(key) => match outstanding_demand(&state, key) {
                Some(reply) => Ok(reply.into_response()),
                None => Err(ApiError::NotFound(
                    PaymentError::UnknownCommitment(key).to_string(),
                )),
            },
            None => Err(err.into()),
        },
    }
}

/// `GET /peers`
pub async fn peers(State(state): State<AppState>) -> Json<PeerList> {
    Json(PeerList {
        peers: state.gossip.peers(),
    })
}

/// `GET /metrics`
pub async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let text = ks_telemetry::encode_metrics().map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        text,
    ))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        records: state.store.len(),
        peers: state.gossip.peers().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_max_forwards() {
        let mut headers = HeaderMap::new();
        assert!(may_forward(&headers));
        headers.insert(MAX_FORWARDS, HeaderValue::from_static("0"));
        assert!(!may_forward(&headers));
        headers.insert(MAX_FORWARDS, HeaderValue::from_static("3"));
        assert!(may_forward(&headers));
    }

    #[test]
    fn test_write_authorization_from_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(write_authorization(&headers), Ok(WriteAuthorization::None));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("POP abc"));
        assert_eq!(
            write_authorization(&headers),
            Ok(WriteAuthorization::Bearer("abc".into()))
        );

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(
            write_authorization(&headers),
            Ok(WriteAuthorization::Bearer("Basic xyz".into()))
        );
    }
}
