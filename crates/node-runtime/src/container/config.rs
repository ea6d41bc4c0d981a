//! # Node Configuration
//!
//! One TOML file, one section per subsystem. Every field has a default, so an
//! empty file (or no file) yields a working devnet node:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//!
//! [ledger]
//! confirmation_depth = 2
//! token_secret = "<64 hex chars>"   # tokens survive restarts
//!
//! [oracle]
//! mode = "json_rpc"
//! url = "http://127.0.0.1:8332"
//!
//! [gossip]
//! peers = ["http://10.0.0.2:8080", "http://10.0.0.3:8080"]
//! ```
//!
//! CLI flags are applied on top of the file, then [`NodeConfig::validate`]
//! runs before anything is built.

use ks_01_commitment_ledger::{DemandTemplate, FeeSchedule, LedgerConfig, TokenIssuer};
use ks_02_payment_verification::{JsonRpcConfig, VerifierConfig};
use ks_03_metadata_store::StoreConfig;
use ks_04_gossip::GossipConfig;
use ks_05_api_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};
use shared_types::{BackoffPolicy, PAYMENT_URL};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub server: ServerConfig,
    pub ledger: LedgerSection,
    pub oracle: OracleSection,
    pub store: StoreSection,
    pub gossip: GossipSection,
    pub maintenance: MaintenanceSection,
}

/// HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub max_body_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_body_bytes: 64 * 1024,
            request_timeout_secs: 30,
        }
    }
}

/// Commitments, pricing and tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// Network name echoed in payment demands.
    pub network: String,
    /// Recipient every client payment must pay.
    pub payee: String,
    pub memo: Option<String>,
    pub fee_per_byte: u64,
    pub min_fee: u64,
    pub payment_window_secs: u64,
    pub token_ttl_secs: u64,
    /// Confirmations before a record is pushed to peers.
    pub confirmation_depth: u64,
    pub pending_push_ttl_secs: u64,
    pub used_token_retention_secs: u64,
    /// Hex HMAC key for tokens. Random per process when unset.
    pub token_secret: Option<String>,
}

impl Default for LedgerSection {
    fn default() -> Self {
        let ledger = LedgerConfig::default();
        let template = DemandTemplate::default();
        Self {
            network: template.network,
            payee: template.payee,
            memo: template.memo,
            fee_per_byte: ledger.fees.fee_per_byte,
            min_fee: ledger.fees.min_fee,
            payment_window_secs: ledger.payment_window,
            token_ttl_secs: ledger.token_ttl,
            confirmation_depth: ledger.confirmation_depth,
            pending_push_ttl_secs: ledger.pending_push_ttl,
            used_token_retention_secs: ledger.used_token_retention,
            token_secret: None,
        }
    }
}

/// Where payments are looked up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleMode {
    /// In-process simulated chain that mines on a timer.
    #[default]
    Devnet,
    /// A Bitcoin-Core-style JSON-RPC node.
    JsonRpc,
}

/// Ledger oracle connection and confirmation watching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSection {
    pub mode: OracleMode,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub poll_interval_secs: u64,
    pub scan_out_of_band: bool,
    /// Devnet only: seconds between mined blocks. Zero disables the miner.
    pub block_interval_secs: u64,
}

impl Default for OracleSection {
    fn default() -> Self {
        let rpc = JsonRpcConfig::default();
        let verifier = VerifierConfig::default();
        Self {
            mode: OracleMode::Devnet,
            url: rpc.url,
            username: None,
            password: None,
            timeout_secs: verifier.oracle_timeout.as_secs(),
            retry_attempts: verifier.retry.max_attempts,
            poll_interval_secs: verifier.poll_interval.as_secs(),
            scan_out_of_band: verifier.scan_out_of_band,
            block_interval_secs: 10,
        }
    }
}

/// Record storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub max_payload_size: usize,
    pub clock_skew_secs: u64,
    /// RocksDB directory. Records stay in memory when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for StoreSection {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            max_payload_size: store.max_payload_size,
            clock_skew_secs: store.clock_skew,
            data_dir: None,
        }
    }
}

/// Static peers and replication tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipSection {
    pub peers: Vec<String>,
    pub fanout: usize,
    pub peer_timeout_secs: u64,
    pub push_attempts: u32,
    pub push_initial_delay_ms: u64,
    pub push_max_delay_ms: u64,
}

impl Default for GossipSection {
    fn default() -> Self {
        let gossip = GossipConfig::default();
        Self {
            peers: Vec::new(),
            fanout: gossip.fanout,
            peer_timeout_secs: gossip.peer_timeout.as_secs(),
            push_attempts: gossip.push_retry.max_attempts,
            push_initial_delay_ms: gossip.push_retry.initial_delay.as_millis() as u64,
            push_max_delay_ms: gossip.push_retry.max_delay.as_millis() as u64,
        }
    }
}

/// Periodic cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceSection {
    /// Seconds between expired-record sweeps.
    pub prune_interval_secs: u64,
    /// Seconds between ledger garbage collections.
    pub sweep_interval_secs: u64,
}

impl Default for MaintenanceSection {
    fn default() -> Self {
        Self {
            prune_interval_secs: 60,
            sweep_interval_secs: 30,
        }
    }
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io)?;
        }
        fs::write(path, toml::to_string_pretty(self)?).map_err(io)
    }

    /// Reject settings the subsystems cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.ledger.confirmation_depth == 0 {
            return invalid("ledger.confirmation_depth must be at least 1".into());
        }
        if self.ledger.payee.trim().is_empty() {
            return invalid("ledger.payee must not be empty".into());
        }
        if self.ledger.payment_window_secs == 0 || self.ledger.token_ttl_secs == 0 {
            return invalid("ledger payment window and token TTL must be non-zero".into());
        }
        self.token_issuer()?;

        if self.store.max_payload_size == 0 {
            return invalid("store.max_payload_size must be non-zero".into());
        }
        if self.server.max_body_bytes < self.store.max_payload_size {
            return invalid(format!(
                "server.max_body_bytes ({}) is below store.max_payload_size ({})",
                self.server.max_body_bytes, self.store.max_payload_size
            ));
        }
        if self.store.data_dir.is_some() && !cfg!(feature = "rocksdb") {
            return invalid("store.data_dir needs a build with the rocksdb feature".into());
        }

        if self.oracle.timeout_secs == 0 || self.oracle.poll_interval_secs == 0 {
            return invalid("oracle timeout and poll interval must be non-zero".into());
        }
        if self.oracle.mode == OracleMode::JsonRpc && !is_http_url(&self.oracle.url) {
            return invalid(format!("oracle.url {:?} is not an http(s) URL", self.oracle.url));
        }

        if self.gossip.peer_timeout_secs == 0 {
            return invalid("gossip.peer_timeout_secs must be non-zero".into());
        }
        if let Some(peer) = self.gossip.peers.iter().find(|p| !is_http_url(p)) {
            return invalid(format!("gossip peer {peer:?} is not an http(s) URL"));
        }

        if self.maintenance.prune_interval_secs == 0 || self.maintenance.sweep_interval_secs == 0 {
            return invalid("maintenance intervals must be non-zero".into());
        }
        Ok(())
    }

    pub fn token_issuer(&self) -> Result<TokenIssuer, ConfigError> {
        let Some(secret) = &self.ledger.token_secret else {
            return Ok(TokenIssuer::random());
        };
        let bytes = hex::decode(secret.trim())
            .map_err(|e| ConfigError::Invalid(format!("ledger.token_secret: {e}")))?;
        let secret: [u8; 32] = bytes.try_into().map_err(|_| {
            ConfigError::Invalid("ledger.token_secret must be 32 bytes (64 hex chars)".into())
        })?;
        Ok(TokenIssuer::new(secret))
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            fees: FeeSchedule {
                fee_per_byte: self.ledger.fee_per_byte,
                min_fee: self.ledger.min_fee,
            },
            payment_window: self.ledger.payment_window_secs,
            token_ttl: self.ledger.token_ttl_secs,
            confirmation_depth: self.ledger.confirmation_depth,
            max_payload_size: self.store.max_payload_size,
            pending_push_ttl: self.ledger.pending_push_ttl_secs,
            used_token_retention: self.ledger.used_token_retention_secs,
        }
    }

    pub fn demand_template(&self) -> DemandTemplate {
        DemandTemplate {
            network: self.ledger.network.clone(),
            payee: self.ledger.payee.clone(),
            memo: self.ledger.memo.clone(),
            payment_url: PAYMENT_URL.to_string(),
        }
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        let timeout = Duration::from_secs(self.oracle.timeout_secs);
        VerifierConfig {
            payee: self.ledger.payee.clone(),
            oracle_timeout: timeout,
            retry: BackoffPolicy {
                max_attempts: self.oracle.retry_attempts,
                ..BackoffPolicy::default()
            },
            poll_interval: Duration::from_secs(self.oracle.poll_interval_secs),
            scan_out_of_band: self.oracle.scan_out_of_band,
        }
    }

    pub fn json_rpc_config(&self) -> JsonRpcConfig {
        JsonRpcConfig {
            url: self.oracle.url.clone(),
            username: self.oracle.username.clone(),
            password: self.oracle.password.clone(),
            timeout: Duration::from_secs(self.oracle.timeout_secs),
            ..JsonRpcConfig::default()
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_payload_size: self.store.max_payload_size,
            clock_skew: self.store.clock_skew_secs,
        }
    }

    pub fn gossip_config(&self) -> GossipConfig {
        GossipConfig {
            peers: self.gossip.peers.clone(),
            fanout: self.gossip.fanout,
            peer_timeout: Duration::from_secs(self.gossip.peer_timeout_secs),
            push_retry: BackoffPolicy {
                max_attempts: self.gossip.push_attempts,
                initial_delay: Duration::from_millis(self.gossip.push_initial_delay_ms),
                max_delay: Duration::from_millis(self.gossip.push_max_delay_ms),
                ..BackoffPolicy::default()
            },
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            max_body_bytes: self.server.max_body_bytes,
            max_payload_size: self.store.max_payload_size,
            request_timeout: Duration::from_secs(self.server.request_timeout_secs),
        }
    }
}

fn is_http_url(url: &str) -> bool {
    let url = url.trim();
    ["http://", "https://"]
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme))
}
