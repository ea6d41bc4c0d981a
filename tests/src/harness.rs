//! In-process keyserver clusters.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ks_02_payment_verification::InMemoryLedger;
use node_runtime::adapters::NodeOracle;
use node_runtime::{KeyserverNode, NodeConfig, NodeRuntime};
use shared_crypto::Secp256k1KeyPair;
use shared_types::{AddressMetadata, Entry, SystemTimeSource, TimeSource};
use tokio::net::TcpListener;

use crate::client::KeyserverClient;

/// Confirmations required before a record is pushed.
pub const CONFIRMATIONS: u64 = 2;

/// Configuration every cluster node starts from: manual mining, fast
/// retries, short peer timeouts.
pub fn test_config(peers: Vec<String>) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.ledger.confirmation_depth = CONFIRMATIONS;
    config.oracle.block_interval_secs = 0;
    config.oracle.poll_interval_secs = 1;
    config.oracle.retry_attempts = 1;
    config.gossip.peers = peers;
    config.gossip.peer_timeout_secs = 2;
    config.gossip.push_attempts = 3;
    config.gossip.push_initial_delay_ms = 50;
    config.gossip.push_max_delay_ms = 200;
    config
}

pub struct Cluster {
    pub chain: Arc<InMemoryLedger>,
    pub nodes: Vec<KeyserverClient>,
    runtimes: Vec<NodeRuntime>,
}

impl Cluster {
    /// Start one node per entry of `topology`; `topology[i]` lists the
    /// nodes node `i` pushes to and pulls from.
    pub async fn start(topology: &[&[usize]]) -> Self {
        Self::start_with(topology, |_, _| {}).await
    }

    /// Like [`Cluster::start`], with a hook to adjust each node's config.
    pub async fn start_with<F>(topology: &[&[usize]], tweak: F) -> Self
    where
        F: Fn(usize, &mut NodeConfig),
    {
        let mut listeners = Vec::with_capacity(topology.len());
        for _ in topology {
            listeners.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
        }
        let urls: Vec<String> = listeners
            .iter()
            .map(|l| format!("http://{}", l.local_addr().unwrap()))
            .collect();

        let chain = Arc::new(InMemoryLedger::new());
        let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
        let mut runtimes = Vec::with_capacity(topology.len());
        for (index, (peers, listener)) in topology.iter().zip(listeners).enumerate() {
            let mut config = test_config(peers.iter().map(|&i| urls[i].clone()).collect());
            tweak(index, &mut config);
            let node = KeyserverNode::with_oracle(
                config,
                NodeOracle::Devnet(chain.clone()),
                clock.clone(),
            )
            .unwrap();
            let mut runtime = NodeRuntime::new(node);
            runtime.spawn(listener).unwrap();
            runtimes.push(runtime);
        }

        Self {
            chain,
            nodes: urls.into_iter().map(KeyserverClient::new).collect(),
            runtimes,
        }
    }

    pub fn node(&self, index: usize) -> &KeyserverClient {
        &self.nodes[index]
    }

    pub async fn shutdown(self) {
        for runtime in self.runtimes {
            runtime.shutdown().await;
        }
    }
}

pub fn unix_now() -> u64 {
    SystemTimeSource.now()
}

/// A signed record for `keys`, encoded as it goes on the wire.
pub fn signed_record(keys: &Secp256k1KeyPair, timestamp: u64, entry: &str) -> Vec<u8> {
    let metadata = AddressMetadata {
        timestamp,
        ttl: 3600,
        entries: vec![Entry {
            headers: vec![],
            entry_data: entry.as_bytes().to_vec(),
        }],
    };
    keys.sign_metadata(&metadata).unwrap().encode().unwrap()
}

/// Poll `check` every 50ms until it returns true or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
