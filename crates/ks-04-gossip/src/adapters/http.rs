//! # HTTP Peer Transport
//!
//! Peers are other keyservers; the engine talks to their public endpoints
//! exactly like a client would.
//!
//! | Call | Request | Answers |
//! |------|---------|---------|
//! | push | `PUT {peer}/keys/{addr}`, `Authorization: POP-TX <txid>` | 200 accepted, 409 conflict, 402 unconfirmed (retry), other 4xx rejected, 5xx retry |
//! | fetch | `GET {peer}/keys/{addr}`, `Max-Forwards: 0` | 200 bytes, 404 none, 5xx retry |

use crate::domain::{PushOutcome, TransportError};
use crate::ports::PeerTransport;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, MAX_FORWARDS};
use reqwest::{Client, StatusCode};
use shared_types::{Address, Credential, TxId};
use std::time::Duration;
use tracing::debug;

const OCTET_STREAM: &str = "application/octet-stream";

/// `reqwest`-backed [`PeerTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    fn map_send_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Unreachable(err.to_string())
        }
    }
}

fn record_url(peer: &str, address: &Address) -> String {
    format!("{}/keys/{}", peer.trim_end_matches('/'), address)
}

fn push_outcome(status: StatusCode) -> Result<PushOutcome, TransportError> {
    if status.is_success() {
        Ok(PushOutcome::Accepted)
    } else if status == StatusCode::CONFLICT {
        Ok(PushOutcome::Conflict)
    } else if status == StatusCode::PAYMENT_REQUIRED {
        Ok(PushOutcome::Unconfirmed)
    } else if status.is_client_error() {
        Ok(PushOutcome::Rejected(status.as_u16()))
    } else {
        Err(TransportError::Status(status.as_u16()))
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn push_record(
        &self,
        peer: &str,
        address: &Address,
        raw: &[u8],
        txid: &TxId,
    ) -> Result<PushOutcome, TransportError> {
        let response = self
            .client
            .put(record_url(peer, address))
            .header(AUTHORIZATION, Credential::ChainProof(*txid).header_value())
            .header(CONTENT_TYPE, OCTET_STREAM)
            .body(raw.to_vec())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        debug!("[ks-04] PUT {} -> {}", peer, status);
        push_outcome(status)
    }

    async fn fetch_record(
        &self,
        peer: &str,
        address: &Address,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let response = self
            .client
            .get(record_url(peer, address))
            .header(MAX_FORWARDS, "0")
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        match response.status() {
            StatusCode::OK => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| TransportError::Malformed(e.to_string()))?;
                Ok(Some(body.to_vec()))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(TransportError::Status(status.as_u16())),
        }
    }
}
