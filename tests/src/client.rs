//! HTTP client speaking the keyserver protocol, as a wallet would.

use ks_02_payment_verification::SimulatedTransaction;
use ks_05_api_gateway::{HealthResponse, PeerList, WriteResponse};
use reqwest::header::{AUTHORIZATION, MAX_FORWARDS};
use reqwest::{Response, StatusCode};
use std::time::Duration;

use shared_types::{
    Address, CommitRequest, Payment, PaymentOutput, PaymentRequest, TxId, PAYMENT_URL,
};

pub struct KeyserverClient {
    http: reqwest::Client,
    pub base: String,
}

impl KeyserverClient {
    pub fn new(base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn commit(&self, request: &CommitRequest) -> Response {
        self.http
            .post(self.url("/commit"))
            .json(request)
            .send()
            .await
            .unwrap()
    }

    pub async fn put(&self, address: &Address, raw: &[u8], authorization: Option<&str>) -> Response {
        let mut request = self
            .http
            .put(self.url(&format!("/keys/{address}")))
            .body(raw.to_vec());
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        request.send().await.unwrap()
    }

    /// Read, letting the node pull from its peers on a miss.
    pub async fn get(&self, address: &Address) -> Response {
        self.http
            .get(self.url(&format!("/keys/{address}")))
            .send()
            .await
            .unwrap()
    }

    /// Read this node's own store only.
    pub async fn get_local(&self, address: &Address) -> Response {
        self.http
            .get(self.url(&format!("/keys/{address}")))
            .header(MAX_FORWARDS, "0")
            .send()
            .await
            .unwrap()
    }

    /// Bytes stored locally for `address`, if any.
    pub async fn local_record(&self, address: &Address) -> Option<Vec<u8>> {
        let response = self.get_local(address).await;
        if response.status() != StatusCode::OK {
            return None;
        }
        Some(response.bytes().await.unwrap().to_vec())
    }

    /// Poll the local store until it holds exactly `expected`.
    pub async fn wait_for_record(&self, address: &Address, expected: &[u8], timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.local_record(address).await.as_deref() == Some(expected) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub async fn pay(&self, payment: &Payment) -> Response {
        self.http
            .post(self.url(PAYMENT_URL))
            .json(payment)
            .send()
            .await
            .unwrap()
    }

    pub async fn peers(&self) -> PeerList {
        let response = self.http.get(self.url("/peers")).send().await.unwrap();
        response.json().await.unwrap()
    }

    pub async fn health(&self) -> HealthResponse {
        let response = self.http.get(self.url("/health")).send().await.unwrap();
        response.json().await.unwrap()
    }

    /// Ask for a write without a token and parse the demand that comes back.
    pub async fn demand_for(&self, address: &Address, raw: &[u8]) -> PaymentRequest {
        let response = self.put(address, raw, None).await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        response.json().await.unwrap()
    }

    /// Pay `demand` in full. Returns the `Authorization` value and the
    /// paying transaction.
    pub async fn settle(&self, demand: &PaymentRequest) -> (String, TxId) {
        let (payment, txid) = payment_for(demand, demand.required_amount);
        let response = self.pay(&payment).await;
        assert_eq!(response.status(), StatusCode::OK);
        let authorization = response.headers()[AUTHORIZATION]
            .to_str()
            .unwrap()
            .to_string();
        (authorization, txid)
    }

    /// Full paid write: demand, payment, then the write with its token.
    pub async fn paid_write(&self, address: &Address, raw: &[u8]) -> (WriteResponse, TxId) {
        let demand = self.demand_for(address, raw).await;
        let (authorization, txid) = self.settle(&demand).await;
        let response = self.put(address, raw, Some(&authorization)).await;
        assert_eq!(response.status(), StatusCode::OK);
        (response.json().await.unwrap(), txid)
    }
}

/// A payment paying `amount` to the demand's recipient and carrying its
/// data output.
pub fn payment_for(demand: &PaymentRequest, amount: u64) -> (Payment, TxId) {
    let recipient = demand
        .outputs
        .iter()
        .find_map(|output| match output {
            PaymentOutput::Payment { recipient, .. } => Some(recipient.clone()),
            PaymentOutput::Data { .. } => None,
        })
        .unwrap();
    let mut metadata_digest = [0u8; 32];
    metadata_digest.copy_from_slice(demand.data_output().unwrap());

    let raw_tx = SimulatedTransaction::paying(&recipient, amount, &metadata_digest).encode();
    let txid = SimulatedTransaction::txid_of(&raw_tx);
    let payment = Payment {
        merchant_data: demand.merchant_data.clone(),
        transactions: vec![raw_tx],
        memo: None,
    };
    (payment, txid)
}
