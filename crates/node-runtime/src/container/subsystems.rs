//! # Subsystem Container
//!
//! Builds every subsystem and holds the shared instances.
//!
//! ## Initialization Order
//!
//! ```text
//! Level 0: Event bus, clock, ledger oracle
//! Level 1: Commitment Ledger (ks-01)
//! Level 2: Payment Verification (ks-02)  -> ks-01, oracle, bus
//! Level 3: Metadata Store (ks-03)        -> gate(ks-01, ks-02), backend, bus
//! Level 4: Gossip (ks-04)                -> store bridge(ks-03), HTTP transport
//! Level 5: API Gateway (ks-05)           -> all of the above
//! ```
//!
//! All subsystems are held in `Arc`; each guards its own state internally.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tracing::info;

use ks_01_commitment_ledger::LedgerService;
use ks_02_payment_verification::{InMemoryLedger, JsonRpcOracle, OracleError, PaymentVerifier};
use ks_03_metadata_store::{MemoryBackend, MetadataStore, StoreError};
use ks_04_gossip::{GossipEngine, HttpTransport, TransportError};
use ks_05_api_gateway::{build_router, AppState};
use shared_bus::InMemoryEventBus;
use shared_types::{SystemTimeSource, TimeSource};

use crate::adapters::{LedgerGate, NodeBackend, NodeOracle, StoreBridge};
use crate::container::config::{ConfigError, NodeConfig, OracleMode};

pub type NodeVerifier = PaymentVerifier<NodeOracle, LedgerService>;
pub type NodeGate = LedgerGate<LedgerService, NodeVerifier>;
pub type NodeStore = MetadataStore<NodeBackend, NodeGate>;
pub type NodeGossip = GossipEngine<HttpTransport, StoreBridge<NodeStore>>;

/// Failures while assembling a node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("ledger oracle: {0}")]
    Oracle(#[from] OracleError),

    #[error("record storage: {0}")]
    Storage(#[from] StoreError),

    #[error("peer transport: {0}")]
    Transport(#[from] TransportError),
}

/// Every subsystem of one keyserver node.
pub struct KeyserverNode {
    pub config: NodeConfig,
    pub bus: Arc<InMemoryEventBus>,
    pub ledger: Arc<LedgerService>,
    pub verifier: Arc<NodeVerifier>,
    pub store: Arc<NodeStore>,
    pub gossip: Arc<NodeGossip>,
    /// The simulated chain when running in devnet mode.
    pub devnet: Option<Arc<InMemoryLedger>>,
}

impl KeyserverNode {
    /// Build a node on the system clock with the oracle its config names.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let oracle = match config.oracle.mode {
            OracleMode::Devnet => NodeOracle::Devnet(Arc::new(InMemoryLedger::new())),
            OracleMode::JsonRpc => NodeOracle::JsonRpc(JsonRpcOracle::new(config.json_rpc_config())?),
        };
        Self::with_oracle(config, oracle, Arc::new(SystemTimeSource))
    }

    /// Build a node around an existing oracle and clock. Several nodes can
    /// share one devnet chain this way.
    pub fn with_oracle(
        config: NodeConfig,
        oracle: NodeOracle,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let devnet = oracle.devnet();
        let bus = Arc::new(InMemoryEventBus::new());

        let ledger = Arc::new(LedgerService::new(
            config.ledger_config(),
            config.demand_template(),
            config.token_issuer()?,
            clock.clone(),
        ));
        info!(
            "[ks-01] Commitment ledger ready (D={}, payee {})",
            config.ledger.confirmation_depth, config.ledger.payee
        );

        let verifier = Arc::new(PaymentVerifier::new(
            config.verifier_config(),
            config.ledger.memo.clone(),
            Arc::new(oracle),
            ledger.clone(),
            bus.clone(),
        ));
        info!(
            "[ks-02] Payment verifier ready ({:?} oracle)",
            config.oracle.mode
        );

        let backend = Arc::new(open_backend(&config)?);
        info!("[ks-03] Record backend: {}", backend.kind());
        let gate = Arc::new(LedgerGate::new(ledger.clone(), verifier.clone()));
        let store = Arc::new(MetadataStore::new(
            config.store_config(),
            backend,
            gate,
            bus.clone(),
            clock.clone(),
        ));

        let transport = Arc::new(HttpTransport::new(Duration::from_secs(
            config.gossip.peer_timeout_secs,
        ))?);
        let gossip = Arc::new(GossipEngine::new(
            config.gossip_config(),
            transport,
            Arc::new(StoreBridge::new(store.clone())),
            clock,
        ));
        info!("[ks-04] Gossip ready ({} static peer(s))", config.gossip.peers.len());

        Ok(Self {
            config,
            bus,
            ledger,
            verifier,
            store,
            gossip,
            devnet,
        })
    }

    /// The HTTP surface over this node's subsystems.
    pub fn router(&self) -> Router {
        build_router(AppState {
            ledger: self.ledger.clone(),
            payments: self.verifier.clone(),
            store: self.store.clone(),
            gossip: self.gossip.clone(),
            config: self.config.gateway_config(),
        })
    }
}

#[cfg(feature = "rocksdb")]
fn open_backend(config: &NodeConfig) -> Result<NodeBackend, StoreError> {
    use crate::adapters::storage::RocksDbBackend;

    match &config.store.data_dir {
        Some(dir) => Ok(NodeBackend::RocksDb(RocksDbBackend::open_default(dir)?)),
        None => Ok(NodeBackend::Memory(MemoryBackend::new())),
    }
}

#[cfg(not(feature = "rocksdb"))]
fn open_backend(_config: &NodeConfig) -> Result<NodeBackend, StoreError> {
    Ok(NodeBackend::Memory(MemoryBackend::new()))
}
