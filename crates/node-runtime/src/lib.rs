//! # Keyserver Node Runtime
//!
//! Builds one keyserver node from a [`NodeConfig`] and runs it.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and the subsystem container
//! - `adapters/` - ports joining subsystems (payment gate, store bridge,
//!   oracle and backend selection)
//! - `handlers/` - background tasks (maintenance, devnet miner, event log)
//!
//! ## Write and Replication Flow
//!
//! ```text
//! client ── POST /commit ──→ ks-01 ──→ 402 demand
//!        ── POST /payments ─→ ks-02 ──→ ks-01 token
//!        ── PUT /keys/:a ───→ ks-03 (redeem token, store)
//!
//! ConfirmationWatcher(ks-02) ── depth ≥ D ──→ PropagationReady ──→ bus
//!                                                                   │
//!                                        GossipRelay(ks-04) ←───────┘
//!                                                │
//!                                   PUT /keys/:a + chain proof ──→ peers
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Load configuration, apply CLI overrides, validate
//! 2. Build subsystems in dependency order ([`KeyserverNode`])
//! 3. Bind the listener and spawn background tasks
//! 4. Serve HTTP until shutdown

pub mod adapters;
pub mod container;
pub mod handlers;

pub use container::{ConfigError, KeyserverNode, NodeConfig, NodeError, OracleMode};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ks_02_payment_verification::ConfirmationWatcher;
use ks_04_gossip::GossipRelay;
use shared_bus::{EventFilter, EventTopic, DEFAULT_QUEUE_CAPACITY};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::handlers::{DevnetMiner, EventLogger, Maintenance};

/// A node plus its running tasks.
pub struct NodeRuntime {
    node: Arc<KeyserverNode>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl NodeRuntime {
    pub fn new(node: KeyserverNode) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            node: Arc::new(node),
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    pub fn node(&self) -> &Arc<KeyserverNode> {
        &self.node
    }

    /// Bind `server.listen` and start everything.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let listen = self.node.config.server.listen;
        let listener = TcpListener::bind(listen)
            .await
            .with_context(|| format!("failed to bind {listen}"))?;
        self.spawn(listener)
    }

    /// Start background tasks and serve HTTP on `listener`.
    pub fn spawn(&mut self, listener: TcpListener) -> Result<SocketAddr> {
        let addr = listener.local_addr().context("listener has no address")?;
        let node = &self.node;
        let config = &node.config;

        info!("===========================================");
        info!("  PoP Keyserver v{}", env!("CARGO_PKG_VERSION"));
        info!("  Confirmation depth: {}", config.ledger.confirmation_depth);
        info!("===========================================");

        // Subscriptions are taken before any task runs so no event is missed.
        let relay_events = node.bus.work_queue(
            EventFilter::topics(vec![EventTopic::Gossip]),
            DEFAULT_QUEUE_CAPACITY,
        );
        let logged_events = node.bus.subscribe(EventFilter::all());

        let watcher = ConfirmationWatcher::new(node.verifier.clone(), self.shutdown_rx.clone());
        self.handles.push(tokio::spawn(watcher.run()));

        let relay = GossipRelay::new(node.gossip.clone(), relay_events, self.shutdown_rx.clone());
        self.handles.push(tokio::spawn(relay.run()));

        let maintenance = Maintenance::new(
            node.ledger.clone(),
            node.store.clone(),
            Duration::from_secs(config.maintenance.prune_interval_secs),
            Duration::from_secs(config.maintenance.sweep_interval_secs),
            self.shutdown_rx.clone(),
        );
        self.handles.push(tokio::spawn(maintenance.run()));

        self.handles.push(tokio::spawn(
            EventLogger::new(logged_events, self.shutdown_rx.clone()).run(),
        ));

        if let Some(chain) = &node.devnet {
            if config.oracle.block_interval_secs > 0 {
                let miner = DevnetMiner::new(
                    chain.clone(),
                    Duration::from_secs(config.oracle.block_interval_secs),
                    self.shutdown_rx.clone(),
                );
                self.handles.push(tokio::spawn(miner.run()));
            }
        }

        let router = node.router();
        let shutdown = self.shutdown_rx.clone();
        self.handles.push(tokio::spawn(async move {
            if let Err(e) = ks_05_api_gateway::serve(listener, router, shutdown).await {
                error!("[ks-05] HTTP server failed: {}", e);
            }
        }));

        info!("Node running on http://{}", addr);
        Ok(addr)
    }

    /// Signal every task and wait for them to finish.
    pub async fn shutdown(mut self) {
        info!("Shutting down node...");
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Task ended abnormally: {}", e);
            }
        }
        info!("Node stopped");
    }
}
