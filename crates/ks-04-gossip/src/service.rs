//! # Gossip Engine
//!
//! ## Push
//!
//! ```text
//! PropagationReady(addr, digest, txid)
//!        │
//!        ├─ local record gone or digest differs ──→ skipped (superseded)
//!        │
//!        └─ one task per peer: PUT with POP-TX <txid>
//!              ├─ 2xx / 409 / 4xx        → final
//!              └─ 402 / 5xx / timeout    → sleep(backoff) and retry
//! ```
//!
//! ## Pull
//!
//! ```text
//! local miss ─→ sample `fanout` peers ─→ GET (Max-Forwards: 0), concurrently
//!                                           │ first verifying response
//!                                           ▼
//!                                   LocalStore::merge (PeerSourced)
//! ```
//!
//! Peer calls never run under a store lock, and a failing peer never blocks
//! its siblings.

use crate::domain::{
    select_peers, verify_peer_record, GossipConfig, PeerTable, PushOutcome, PushResult,
    TransportError,
};
use crate::ports::{GossipApi, LocalStore, PeerTransport};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use ks_telemetry::{metrics, HistogramTimer};
use parking_lot::RwLock;
use shared_types::{Address, BackoffPolicy, Digest, PeerRecord, TimeSource, TxId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Gossip engine.
pub struct GossipEngine<T, S>
where
    T: PeerTransport,
    S: LocalStore,
{
    config: GossipConfig,
    transport: Arc<T>,
    store: Arc<S>,
    peers: Arc<RwLock<PeerTable>>,
    clock: Arc<dyn TimeSource>,
}

impl<T, S> GossipEngine<T, S>
where
    T: PeerTransport + 'static,
    S: LocalStore,
{
    pub fn new(
        config: GossipConfig,
        transport: Arc<T>,
        store: Arc<S>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let peers = Arc::new(RwLock::new(PeerTable::new(config.peers.iter().cloned())));
        Self {
            config,
            transport,
            store,
            peers,
            clock,
        }
    }

    pub fn config(&self) -> &GossipConfig {
        &self.config
    }

    /// Push the current record for `address` to every peer.
    ///
    /// Returns one handle per spawned peer task; dropping them leaves the
    /// tasks running.
    pub async fn push(
        &self,
        address: Address,
        metadata_digest: Digest,
        txid: TxId,
    ) -> Vec<JoinHandle<PushResult>> {
        let record = match self.store.load(&address).await {
            Ok(Some(record)) if record.metadata_digest == metadata_digest => record,
            Ok(_) => {
                metrics::GOSSIP_PUSHES.with_label_values(&["skipped"]).inc();
                debug!("[ks-04] Push for {} skipped: record superseded", address);
                return Vec::new();
            }
            Err(e) => {
                warn!("[ks-04] Push for {} skipped: {}", address, e);
                return Vec::new();
            }
        };

        let urls = self.peers.read().urls();
        if urls.is_empty() {
            return Vec::new();
        }
        info!("[ks-04] Pushing {} to {} peer(s)", address, urls.len());

        let raw: Arc<[u8]> = record.raw.into();
        urls.into_iter()
            .map(|peer| {
                let task = PushTask {
                    peer,
                    address,
                    raw: raw.clone(),
                    txid,
                    transport: self.transport.clone(),
                    peers: self.peers.clone(),
                    clock: self.clock.clone(),
                    policy: self.config.push_retry,
                    timeout: self.config.peer_timeout,
                };
                tokio::spawn(task.run())
            })
            .collect()
    }

    fn record_call(&self, peer: &str, result: &Result<Option<Vec<u8>>, TransportError>) {
        let mut peers = self.peers.write();
        match result {
            Ok(_) => peers.record_success(peer, self.clock.now()),
            Err(e) if e.is_retryable() => peers.record_failure(peer),
            // The peer answered, if unhelpfully.
            Err(_) => peers.record_success(peer, self.clock.now()),
        }
    }
}

#[async_trait]
impl<T, S> GossipApi for GossipEngine<T, S>
where
    T: PeerTransport + 'static,
    S: LocalStore,
{
    async fn pull(&self, address: &Address) -> Option<Vec<u8>> {
        let urls = self.peers.read().urls();
        let selected = {
            let mut rng = rand::thread_rng();
            select_peers(&urls, self.config.fanout, &mut rng)
        };
        if selected.is_empty() {
            return None;
        }

        let timeout = self.config.peer_timeout;
        let mut calls: FuturesUnordered<_> = selected
            .into_iter()
            .map(|peer| async move {
                let _timer = HistogramTimer::new(&metrics::PEER_CALL_DURATION);
                let result = match tokio::time::timeout(
                    timeout,
                    self.transport.fetch_record(&peer, address),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(timeout)),
                };
                (peer, result)
            })
            .collect();

        while let Some((peer, result)) = calls.next().await {
            self.record_call(&peer, &result);
            let raw = match result {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    debug!("[ks-04] Pull of {} from {} failed: {}", address, peer, e);
                    continue;
                }
            };
            if let Err(e) = verify_peer_record(&raw, address) {
                metrics::GOSSIP_PULLS.with_label_values(&["invalid"]).inc();
                warn!("[ks-04] Discarding record for {} from {}: {}", address, peer, e);
                continue;
            }
            match self.store.merge(*address, raw.clone()).await {
                Ok(()) => {
                    metrics::GOSSIP_PULLS.with_label_values(&["found"]).inc();
                    info!("[ks-04] Pulled {} from {}", address, peer);
                    return Some(raw);
                }
                Err(e) => {
                    warn!("[ks-04] Record for {} from {} not merged: {}", address, peer, e);
                    // A concurrent write may have won; serve what we hold.
                    if let Ok(Some(local)) = self.store.load(address).await {
                        metrics::GOSSIP_PULLS.with_label_values(&["found"]).inc();
                        return Some(local.raw);
                    }
                }
            }
        }

        metrics::GOSSIP_PULLS.with_label_values(&["not_found"]).inc();
        None
    }

    fn peers(&self) -> Vec<PeerRecord> {
        self.peers.read().snapshot()
    }
}

/// One record pushed to one peer, with retries.
struct PushTask<T: PeerTransport> {
    peer: String,
    address: Address,
    raw: Arc<[u8]>,
    txid: TxId,
    transport: Arc<T>,
    peers: Arc<RwLock<PeerTable>>,
    clock: Arc<dyn TimeSource>,
    policy: BackoffPolicy,
    timeout: Duration,
}

impl<T: PeerTransport> PushTask<T> {
    async fn attempt(&self) -> Result<PushOutcome, TransportError> {
        let _timer = HistogramTimer::new(&metrics::PEER_CALL_DURATION);
        let call = self
            .transport
            .push_record(&self.peer, &self.address, &self.raw, &self.txid);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        }
    }

    async fn run(self) -> PushResult {
        let mut attempts = 0;
        let outcome = loop {
            attempts += 1;
            match self.attempt().await {
                Ok(outcome) => {
                    self.peers
                        .write()
                        .record_success(&self.peer, self.clock.now());
                    if outcome.is_final() || !self.policy.should_retry(attempts) {
                        break Ok(outcome);
                    }
                    let delay = self.policy.delay_after(attempts);
                    debug!(
                        "[ks-04] {} has not confirmed the payment for {} yet, retry in {:?}",
                        self.peer, self.address, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retryable() => {
                    self.peers.write().record_failure(&self.peer);
                    if !self.policy.should_retry(attempts) {
                        break Err(e);
                    }
                    let delay = self.policy.delay_after(attempts);
                    debug!(
                        "[ks-04] Push of {} to {} failed ({}), retry in {:?}",
                        self.address, self.peer, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => break Err(e),
            }
        };

        match &outcome {
            Ok(PushOutcome::Accepted) => {
                info!("[ks-04] {} accepted by {}", self.address, self.peer);
            }
            Ok(other) => {
                debug!("[ks-04] {} refused by {}: {:?}", self.address, self.peer, other);
            }
            Err(e) => {
                warn!(
                    "[ks-04] Giving up on {} for {} after {} attempt(s): {}",
                    self.peer, self.address, attempts, e
                );
            }
        }
        let label = match &outcome {
            Ok(o) => o.as_str(),
            Err(_) => "failed",
        };
        metrics::GOSSIP_PUSHES.with_label_values(&[label]).inc();

        PushResult {
            peer: self.peer,
            address: self.address,
            attempts,
            outcome,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{GossipError, LocalRecord};
    use parking_lot::Mutex;
    use shared_crypto::{digest, Secp256k1KeyPair};
    use shared_types::{AddressMetadata, AuthWrapper, MockTimeSource, PeerStatus};
    use std::collections::{HashMap, VecDeque};

    /// Scripted peers.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        /// Per-peer push answers, consumed in order; `Accepted` once empty.
        pub push_script: Mutex<HashMap<String, VecDeque<Result<PushOutcome, TransportError>>>>,
        pub pushes: Mutex<Vec<(String, Address, Vec<u8>, TxId)>>,
        pub records: Mutex<HashMap<(String, Address), Vec<u8>>>,
        pub down: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PeerTransport for MockTransport {
        async fn push_record(
            &self,
            peer: &str,
            address: &Address,
            raw: &[u8],
            txid: &TxId,
        ) -> Result<PushOutcome, TransportError> {
            self.pushes
                .lock()
                .push((peer.to_string(), *address, raw.to_vec(), *txid));
            self.push_script
                .lock()
                .get_mut(peer)
                .and_then(|script| script.pop_front())
                .unwrap_or(Ok(PushOutcome::Accepted))
        }

        async fn fetch_record(
            &self,
            peer: &str,
            address: &Address,
        ) -> Result<Option<Vec<u8>>, TransportError> {
            if self.down.lock().iter().any(|p| p == peer) {
                return Err(TransportError::Unreachable("connection refused".into()));
            }
            Ok(self
                .records
                .lock()
                .get(&(peer.to_string(), *address))
                .cloned())
        }
    }

    #[derive(Default)]
    pub(crate) struct MockStore {
        pub records: Mutex<HashMap<Address, Vec<u8>>>,
        pub merged: Mutex<Vec<Address>>,
        /// Simulates a newer record landing before the merge: installed, then
        /// the merge is refused as stale.
        pub concurrent: Mutex<Option<Vec<u8>>>,
        /// Merges to refuse outright, storing nothing.
        pub refuse: Mutex<u32>,
    }

    #[async_trait]
    impl LocalStore for MockStore {
        async fn load(&self, address: &Address) -> Result<Option<LocalRecord>, GossipError> {
            Ok(self.records.lock().get(address).map(|raw| {
                let wrapper = AuthWrapper::decode(raw).unwrap();
                LocalRecord {
                    raw: raw.clone(),
                    metadata_digest: digest(&wrapper.serialized_payload),
                }
            }))
        }

        async fn merge(&self, address: Address, raw: Vec<u8>) -> Result<(), GossipError> {
            {
                let mut refuse = self.refuse.lock();
                if *refuse > 0 {
                    *refuse -= 1;
                    return Err(GossipError::Store("backend unavailable".into()));
                }
            }
            if let Some(newer) = self.concurrent.lock().take() {
                self.records.lock().insert(address, newer);
                return Err(GossipError::Store("stale timestamp".into()));
            }
            self.records.lock().insert(address, raw);
            self.merged.lock().push(address);
            Ok(())
        }
    }

    pub(crate) fn signed(keys: &Secp256k1KeyPair, timestamp: u64) -> (Vec<u8>, Digest) {
        let metadata = AddressMetadata {
            timestamp,
            ttl: 600,
            entries: vec![],
        };
        let wrapper = keys.sign_metadata(&metadata).unwrap();
        (wrapper.encode().unwrap(), digest(&wrapper.serialized_payload))
    }

    pub(crate) fn engine(
        peers: &[&str],
        fanout: usize,
    ) -> (
        GossipEngine<MockTransport, MockStore>,
        Arc<MockTransport>,
        Arc<MockStore>,
    ) {
        let transport = Arc::new(MockTransport::default());
        let store = Arc::new(MockStore::default());
        let config = GossipConfig {
            peers: peers.iter().map(|p| p.to_string()).collect(),
            fanout,
            peer_timeout: Duration::from_secs(1),
            push_retry: BackoffPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                multiplier: 2,
            },
        };
        let engine = GossipEngine::new(
            config,
            transport.clone(),
            store.clone(),
            Arc::new(MockTimeSource::new(1_000)),
        );
        (engine, transport, store)
    }

    async fn join(handles: Vec<JoinHandle<PushResult>>) -> Vec<PushResult> {
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results.sort_by(|a, b| a.peer.cmp(&b.peer));
        results
    }

    #[tokio::test]
    async fn test_push_reaches_every_peer() {
        let (engine, transport, store) = engine(&["http://a", "http://b"], 4);
        let keys = Secp256k1KeyPair::generate();
        let (raw, digest) = signed(&keys, 100);
        store.records.lock().insert(keys.address(), raw.clone());

        let results = join(engine.push(keys.address(), digest, TxId([5; 32])).await).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.outcome == Ok(PushOutcome::Accepted)));
        let pushes = transport.pushes.lock();
        assert!(pushes.iter().all(|(_, a, bytes, txid)| *a == keys.address()
            && *bytes == raw
            && *txid == TxId([5; 32])));
        assert!(engine
            .peers()
            .iter()
            .all(|p| p.status == PeerStatus::Reachable && p.last_success == Some(1_000)));
    }

    #[tokio::test]
    async fn test_superseded_push_is_skipped() {
        let (engine, transport, store) = engine(&["http://a"], 4);
        let keys = Secp256k1KeyPair::generate();
        let (_, old_digest) = signed(&keys, 100);
        let (newer, _) = signed(&keys, 200);
        store.records.lock().insert(keys.address(), newer);

        assert!(engine
            .push(keys.address(), old_digest, TxId([1; 32]))
            .await
            .is_empty());
        assert!(engine
            .push(Address([9; 20]), old_digest, TxId([1; 32]))
            .await
            .is_empty());
        assert!(transport.pushes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_push_retries_transient_failures() {
        let (engine, transport, store) = engine(&["http://a", "http://b"], 4);
        let keys = Secp256k1KeyPair::generate();
        let (raw, digest) = signed(&keys, 100);
        store.records.lock().insert(keys.address(), raw);
        transport.push_script.lock().insert(
            "http://a".into(),
            VecDeque::from([
                Err(TransportError::Status(503)),
                Err(TransportError::Timeout(Duration::from_secs(1))),
            ]),
        );

        let results = join(engine.push(keys.address(), digest, TxId([5; 32])).await).await;
        assert_eq!(results[0].attempts, 3);
        assert_eq!(results[0].outcome, Ok(PushOutcome::Accepted));
        // The sibling peer was not held up.
        assert_eq!(results[1].attempts, 1);
    }

    #[tokio::test]
    async fn test_conflict_is_final() {
        let (engine, transport, store) = engine(&["http://a"], 4);
        let keys = Secp256k1KeyPair::generate();
        let (raw, digest) = signed(&keys, 100);
        store.records.lock().insert(keys.address(), raw);
        transport
            .push_script
            .lock()
            .insert("http://a".into(), VecDeque::from([Ok(PushOutcome::Conflict)]));

        let results = join(engine.push(keys.address(), digest, TxId([5; 32])).await).await;
        assert_eq!(results[0].attempts, 1);
        assert_eq!(results[0].outcome, Ok(PushOutcome::Conflict));
    }

    #[tokio::test]
    async fn test_unconfirmed_answer_is_retried() {
        let (engine, transport, store) = engine(&["http://a"], 4);
        let keys = Secp256k1KeyPair::generate();
        let (raw, digest) = signed(&keys, 100);
        store.records.lock().insert(keys.address(), raw);
        transport
            .push_script
            .lock()
            .insert("http://a".into(), VecDeque::from([Ok(PushOutcome::Unconfirmed)]));

        let results = join(engine.push(keys.address(), digest, TxId([5; 32])).await).await;
        assert_eq!(results[0].attempts, 2);
        assert_eq!(results[0].outcome, Ok(PushOutcome::Accepted));
        assert_eq!(engine.peers()[0].status, PeerStatus::Reachable);
    }

    #[tokio::test]
    async fn test_lagging_peer_exhausts_budget() {
        let (engine, transport, store) = engine(&["http://a"], 4);
        let keys = Secp256k1KeyPair::generate();
        let (raw, digest) = signed(&keys, 100);
        store.records.lock().insert(keys.address(), raw);
        transport.push_script.lock().insert(
            "http://a".into(),
            VecDeque::from(vec![Ok(PushOutcome::Unconfirmed); 5]),
        );

        let results = join(engine.push(keys.address(), digest, TxId([5; 32])).await).await;
        assert_eq!(results[0].attempts, 3);
        assert_eq!(results[0].outcome, Ok(PushOutcome::Unconfirmed));
    }

    #[tokio::test]
    async fn test_push_gives_up_after_budget() {
        let (engine, transport, store) = engine(&["http://a"], 4);
        let keys = Secp256k1KeyPair::generate();
        let (raw, digest) = signed(&keys, 100);
        store.records.lock().insert(keys.address(), raw);
        transport.push_script.lock().insert(
            "http://a".into(),
            VecDeque::from(vec![Err(TransportError::Unreachable("refused".into())); 5]),
        );

        let results = join(engine.push(keys.address(), digest, TxId([5; 32])).await).await;
        assert_eq!(results[0].attempts, 3);
        assert!(results[0].outcome.is_err());
        let peer = &engine.peers()[0];
        assert_eq!(peer.status, PeerStatus::Unreachable);
        assert_eq!(peer.consecutive_failures, 3);
    }

    #[tokio::test]
    async fn test_pull_merges_first_verifying_record() {
        let (engine, transport, store) = engine(&["http://a", "http://b", "http://c"], 0);
        let keys = Secp256k1KeyPair::generate();
        let (raw, _) = signed(&keys, 100);
        let forged = signed(&Secp256k1KeyPair::generate(), 300).0;
        {
            let mut records = transport.records.lock();
            records.insert(("http://a".into(), keys.address()), forged);
            records.insert(("http://b".into(), keys.address()), raw.clone());
        }
        transport.down.lock().push("http://c".into());

        assert_eq!(engine.pull(&keys.address()).await, Some(raw.clone()));
        assert_eq!(*store.merged.lock(), vec![keys.address()]);
        assert_eq!(store.records.lock().get(&keys.address()), Some(&raw));
    }

    #[tokio::test]
    async fn test_pull_lost_race_serves_stored_record() {
        let (engine, transport, store) = engine(&["http://a"], 0);
        let keys = Secp256k1KeyPair::generate();
        let (pulled, _) = signed(&keys, 100);
        let (newer, _) = signed(&keys, 200);
        transport
            .records
            .lock()
            .insert(("http://a".into(), keys.address()), pulled);
        *store.concurrent.lock() = Some(newer.clone());

        assert_eq!(engine.pull(&keys.address()).await, Some(newer));
        assert!(store.merged.lock().is_empty());
    }

    #[tokio::test]
    async fn test_refused_pull_falls_through_to_next_peer() {
        let (engine, transport, store) = engine(&["http://a", "http://b"], 0);
        let keys = Secp256k1KeyPair::generate();
        let (raw, _) = signed(&keys, 100);
        {
            let mut records = transport.records.lock();
            records.insert(("http://a".into(), keys.address()), raw.clone());
            records.insert(("http://b".into(), keys.address()), raw.clone());
        }
        *store.refuse.lock() = 1;

        assert_eq!(engine.pull(&keys.address()).await, Some(raw.clone()));
        assert_eq!(*store.merged.lock(), vec![keys.address()]);
        assert_eq!(store.records.lock().get(&keys.address()), Some(&raw));
    }

    #[tokio::test]
    async fn test_pull_miss() {
        let (engine, transport, store) = engine(&["http://a"], 4);
        transport.down.lock().push("http://a".into());
        assert_eq!(engine.pull(&Address([1; 20])).await, None);
        assert!(store.merged.lock().is_empty());
        assert_eq!(engine.peers()[0].consecutive_failures, 1);

        let (lonely, _, _) = self::engine(&[], 4);
        assert_eq!(lonely.pull(&Address([1; 20])).await, None);
    }
}
