//! # JSON-RPC Ledger Oracle
//!
//! Talks to a Bitcoin-Core-style node over HTTP JSON-RPC.
//!
//! | Port method | RPC calls |
//! |-------------|-----------|
//! | `broadcast` | `decoderawtransaction`, `sendrawtransaction` |
//! | `transaction` | `getrawtransaction <txid> true` (needs `-txindex` for mined txs) |
//! | `find_by_data` | `getrawmempool`, `getblockcount`, `getblockhash`, `getblock <hash> 2` |
//!
//! Value outputs are reported by address; amounts are converted from coins
//! to base units (1e8). Data outputs are `OP_RETURN` scripts.

use crate::domain::{LedgerTransaction, OracleError};
use crate::ports::LedgerOracle;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{Digest, PaymentOutput, TxId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// `RPC_INVALID_ADDRESS_OR_KEY`: no such transaction.
const RPC_NOT_FOUND: i64 = -5;
/// `RPC_VERIFY_ALREADY_IN_CHAIN`.
const RPC_ALREADY_IN_CHAIN: i64 = -27;
const OP_RETURN: u8 = 0x6a;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const COIN: f64 = 100_000_000.0;

/// Connection settings for [`JsonRpcOracle`].
#[derive(Debug, Clone)]
pub struct JsonRpcConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    /// Recent blocks searched by `find_by_data`.
    pub scan_depth: u64,
    /// Unconfirmed transactions inspected per `find_by_data` call.
    pub mempool_scan_limit: usize,
}

impl Default for JsonRpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:18443".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(10),
            scan_depth: 6,
            mempool_scan_limit: 500,
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug)]
enum CallError {
    Rpc(JsonRpcError),
    Oracle(OracleError),
}

impl From<CallError> for OracleError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Rpc(e) => OracleError::Rejected(format!("{} (code {})", e.message, e.code)),
            CallError::Oracle(e) => e,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    txid: String,
    #[serde(default)]
    confirmations: u64,
    vout: Vec<RawOutput>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    value: f64,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: ScriptPubKey,
}

#[derive(Debug, Deserialize)]
struct ScriptPubKey {
    hex: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    #[serde(default)]
    confirmations: u64,
    tx: Vec<RawTransaction>,
}

#[derive(Debug, Deserialize)]
struct DecodedTransaction {
    txid: String,
}

/// Ledger oracle backed by a node's JSON-RPC interface.
pub struct JsonRpcOracle {
    client: Client,
    config: JsonRpcConfig,
    request_id: AtomicU64,
}

impl JsonRpcOracle {
    pub fn new(config: JsonRpcConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            config,
            request_id: AtomicU64::new(1),
        })
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R, CallError> {
        let request = JsonRpcRequest {
            jsonrpc: "1.0",
            id: self.request_id.fetch_add(1, Ordering::SeqCst),
            method,
            params,
        };

        let mut builder = self.client.post(&self.config.url).json(&request);
        if let Some(user) = &self.config.username {
            builder = builder.basic_auth(user, self.config.password.as_ref());
        }

        let response = builder.send().await.map_err(|e| {
            CallError::Oracle(if e.is_timeout() {
                OracleError::Timeout(self.config.timeout)
            } else {
                OracleError::Unavailable(e.to_string())
            })
        })?;

        // RPC errors come back with a non-2xx status and a JSON body.
        let status = response.status();
        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE
        ) {
            return Err(CallError::Oracle(OracleError::Unavailable(format!(
                "{method}: HTTP {status}"
            ))));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| CallError::Oracle(OracleError::Malformed(e.to_string())))?;

        if let Some(error) = body.error {
            return Err(CallError::Rpc(error));
        }

        let result = body.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| CallError::Oracle(OracleError::Malformed(format!("{method}: {e}"))))
    }

    async fn raw_transaction(&self, txid: &str) -> Result<Option<RawTransaction>, OracleError> {
        match self
            .call::<RawTransaction>("getrawtransaction", json!([txid, true]))
            .await
        {
            Ok(tx) => Ok(Some(tx)),
            Err(CallError::Rpc(e)) if e.code == RPC_NOT_FOUND => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn recent_block_transactions(&self) -> Result<Vec<LedgerTransaction>, OracleError> {
        let count: u64 = self.call("getblockcount", json!([])).await?;
        let mut out = Vec::new();
        let lowest = count.saturating_sub(self.config.scan_depth.saturating_sub(1));
        for height in (lowest..=count).rev() {
            let hash: String = self.call("getblockhash", json!([height])).await?;
            let block: RawBlock = self.call("getblock", json!([hash, 2])).await?;
            let depth = block.confirmations;
            for raw in block.tx {
                let mut tx = convert(raw)?;
                tx.depth = depth;
                out.push(tx);
            }
        }
        Ok(out)
    }
}

fn parse_txid(txid: &str) -> Result<TxId, OracleError> {
    txid.parse()
        .map_err(|e| OracleError::Malformed(format!("txid {txid}: {e}")))
}

/// Payload of an `OP_RETURN <push>` script.
fn op_return_payload(script: &[u8]) -> Option<Vec<u8>> {
    let (&first, rest) = script.split_first()?;
    if first != OP_RETURN {
        return None;
    }
    let (&op, rest) = rest.split_first()?;
    let (len, rest) = match op {
        1..=75 => (op as usize, rest),
        OP_PUSHDATA1 => {
            let (&len, rest) = rest.split_first()?;
            (len as usize, rest)
        }
        OP_PUSHDATA2 => {
            if rest.len() < 2 {
                return None;
            }
            (u16::from_le_bytes([rest[0], rest[1]]) as usize, &rest[2..])
        }
        _ => return None,
    };
    rest.get(..len).map(<[u8]>::to_vec)
}

fn convert(raw: RawTransaction) -> Result<LedgerTransaction, OracleError> {
    let txid = parse_txid(&raw.txid)?;
    let outputs = raw
        .vout
        .into_iter()
        .filter_map(|out| {
            let script = hex::decode(&out.script_pub_key.hex).ok()?;
            if script.first() == Some(&OP_RETURN) {
                return op_return_payload(&script).map(|data| PaymentOutput::Data { data });
            }
            let recipient = out
                .script_pub_key
                .address
                .or_else(|| out.script_pub_key.addresses.into_iter().next())
                .unwrap_or(out.script_pub_key.hex);
            Some(PaymentOutput::Payment {
                recipient,
                amount: (out.value * COIN).round() as u64,
            })
        })
        .collect();
    Ok(LedgerTransaction {
        txid,
        outputs,
        depth: raw.confirmations,
    })
}

#[async_trait]
impl LedgerOracle for JsonRpcOracle {
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<TxId, OracleError> {
        let raw_hex = hex::encode(raw_tx);
        let decoded: DecodedTransaction = self
            .call("decoderawtransaction", json!([raw_hex]))
            .await?;
        let txid = parse_txid(&decoded.txid)?;

        match self
            .call::<String>("sendrawtransaction", json!([raw_hex]))
            .await
        {
            Ok(_) => {
                debug!("[ks-02] Broadcast {}", txid);
                Ok(txid)
            }
            Err(CallError::Rpc(e)) if e.code == RPC_ALREADY_IN_CHAIN => Ok(txid),
            Err(e) => {
                let err = OracleError::from(e);
                warn!("[ks-02] Broadcast of {} failed: {}", txid, err);
                Err(err)
            }
        }
    }

    async fn transaction(&self, txid: &TxId) -> Result<Option<LedgerTransaction>, OracleError> {
        self.raw_transaction(&txid.to_string())
            .await?
            .map(convert)
            .transpose()
    }

    async fn find_by_data(&self, digest: &Digest) -> Result<Vec<LedgerTransaction>, OracleError> {
        let mempool: Vec<String> = self.call("getrawmempool", json!([])).await?;
        let mut found = Vec::new();
        for txid in mempool.iter().take(self.config.mempool_scan_limit) {
            if let Some(raw) = self.raw_transaction(txid).await? {
                let tx = convert(raw)?;
                if tx.carries_data(digest) {
                    found.push(tx);
                }
            }
        }
        found.extend(
            self.recent_block_transactions()
                .await?
                .into_iter()
                .filter(|tx| tx.carries_data(digest)),
        );
        Ok(found)
    }
}
