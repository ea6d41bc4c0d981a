//! # Metadata Store Service
//!
//! ## Write Path
//!
//! ```text
//! raw ─→ decode_write ─→ authorize ─→ verify_signer ─→ check_freshness
//!                           │                               │
//!           no token: implicit commit (402)                 ▼
//!                                          ┌── per-address lock ──────────┐
//!                                          │ drop expired stored record   │
//!                                          │ check_last_writer            │
//!                                          │ backend.put                  │
//!                                          │ redeem token (else restore)  │
//!                                          └──────────────────────────────┘
//!                                                           │
//!                               RecordAccepted (+ PropagationReady) events
//! ```
//!
//! The lock table is a `DashMap<Address, Arc<tokio::sync::Mutex<()>>>`:
//! writers to different addresses never contend, and entries are dropped
//! again once no writer holds them.

use crate::domain::{
    check_freshness, check_last_writer, decode_write, verify_signer, DecodedWrite, StoreConfig,
    StoreError, StoredRecord, WriteAuthorization, WriteReceipt,
};
use crate::ports::{MetadataStoreApi, PaymentGate, RecordBackend};
use async_trait::async_trait;
use dashmap::DashMap;
use ks_01_commitment_ledger::{CommitResponse, TokenRejection};
use ks_02_payment_verification::ChainProofError;
use ks_telemetry::metrics;
use shared_bus::{EventPublisher, KeyserverEvent, WriteSource};
use shared_types::{Address, TimeSource, TxId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Authorization after its pre-check.
enum Authorized {
    Token(String),
    ChainProof { txid: TxId, depth: u64 },
    PeerSourced,
}

/// Metadata store.
pub struct MetadataStore<B, G>
where
    B: RecordBackend,
    G: PaymentGate,
{
    config: StoreConfig,
    backend: Arc<B>,
    gate: Arc<G>,
    locks: DashMap<Address, Arc<Mutex<()>>>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn TimeSource>,
}

impl<B, G> MetadataStore<B, G>
where
    B: RecordBackend,
    G: PaymentGate,
{
    pub fn new(
        config: StoreConfig,
        backend: Arc<B>,
        gate: Arc<G>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        metrics::STORE_RECORDS.set(backend.len() as f64);
        Self {
            config,
            backend,
            gate,
            locks: DashMap::new(),
            publisher,
            clock,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn lock_for(&self, address: Address) -> Arc<Mutex<()>> {
        self.locks.entry(address).or_default().clone()
    }

    fn release_lock(&self, address: &Address) {
        self.locks
            .remove_if(address, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Answer for a token that cannot authorize this write.
    fn token_error(&self, rejection: TokenRejection, write: &DecodedWrite) -> StoreError {
        match rejection {
            TokenRejection::AlreadyUsed | TokenRejection::IdentityMismatch => {
                StoreError::Forbidden(rejection)
            }
            _ => match self.gate.commit(write.key, write.payload_len()) {
                CommitResponse::PaymentRequired(request) => {
                    StoreError::PaymentRequired(Box::new(request))
                }
                CommitResponse::Paid { .. } => StoreError::Forbidden(rejection),
            },
        }
    }

    async fn authorize(
        &self,
        write: &DecodedWrite,
        authorization: WriteAuthorization,
    ) -> Result<Authorized, StoreError> {
        match authorization {
            WriteAuthorization::None => match self.gate.commit(write.key, write.payload_len()) {
                CommitResponse::PaymentRequired(request) => {
                    Err(StoreError::PaymentRequired(Box::new(request)))
                }
                // Paid out of band or earlier; the write itself redeems.
                CommitResponse::Paid { token } => Ok(Authorized::Token(token)),
            },
            WriteAuthorization::Bearer(token) => {
                self.gate
                    .check_token(&token, &write.key)
                    .map_err(|r| self.token_error(r, write))?;
                Ok(Authorized::Token(token))
            }
            WriteAuthorization::ChainProof(txid) => {
                let depth = self
                    .gate
                    .verify_chain_proof(txid, &write.key.metadata_digest, write.payload_len())
                    .await
                    .map_err(|e| match e {
                        ChainProofError::Oracle(o) => StoreError::Unavailable(o.to_string()),
                        // Our view of the chain may lag the pushing peer's.
                        pending @ (ChainProofError::NotFound
                        | ChainProofError::Unconfirmed { .. }) => {
                            StoreError::Unavailable(pending.to_string())
                        }
                        other => StoreError::ProofRejected(other.to_string()),
                    })?;
                Ok(Authorized::ChainProof { txid, depth })
            }
            WriteAuthorization::PeerSourced => Ok(Authorized::PeerSourced),
        }
    }

    /// Drop `address` if its record expired. Caller holds the address lock.
    fn drop_if_expired(
        &self,
        address: &Address,
        record: Option<StoredRecord>,
        now: u64,
    ) -> Result<Option<StoredRecord>, StoreError> {
        match record {
            Some(r) if r.is_expired(now) => {
                if self.backend.remove(address)? {
                    metrics::RECORDS_EXPIRED.inc();
                    metrics::STORE_RECORDS.set(self.backend.len() as f64);
                    debug!("[ks-03] Expired record for {} removed", address);
                }
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Put back what was stored before a write that could not complete.
    fn restore(&self, address: &Address, previous: Option<StoredRecord>) {
        let restored = match &previous {
            Some(record) => self.backend.put(record),
            None => self.backend.remove(address).map(|_| ()),
        };
        if let Err(e) = restored {
            error!("[ks-03] Failed to restore record for {}: {}", address, e);
        }
        metrics::STORE_RECORDS.set(self.backend.len() as f64);
    }

    /// The critical section: LWW, replacement and redemption.
    ///
    /// A token is consumed only after the record is persisted; if redemption
    /// then fails the previous record is put back.
    fn apply(
        &self,
        address: Address,
        raw: Vec<u8>,
        write: DecodedWrite,
        authorized: Authorized,
        source: WriteSource,
    ) -> Result<(StoredRecord, bool), StoreError> {
        let now = self.clock.now();
        let existing = self.drop_if_expired(&address, self.backend.get(&address)?, now)?;
        check_last_writer(existing.as_ref(), write.metadata.timestamp, now)?;

        let (txid, depth) = match &authorized {
            Authorized::Token(token) => {
                let preview = self
                    .gate
                    .check_token(token, &write.key)
                    .map_err(StoreError::Forbidden)?;
                (Some(preview.txid), preview.depth)
            }
            Authorized::ChainProof { txid, depth } => (Some(*txid), *depth),
            Authorized::PeerSourced => (None, 0),
        };

        let record = StoredRecord {
            address,
            raw,
            metadata: write.metadata,
            metadata_digest: write.key.metadata_digest,
            accepted_at: now,
            confirmation_depth: depth,
            txid,
            source,
        };
        if let Err(e) = self.backend.put(&record) {
            error!("[ks-03] Failed to persist record for {}: {}", address, e);
            return Err(e);
        }
        metrics::STORE_RECORDS.set(self.backend.len() as f64);

        let propagate = match authorized {
            Authorized::Token(token) => match self.gate.redeem(&token, &write.key, address) {
                Ok(redemption) => redemption.ready_to_propagate,
                Err(rejection) => {
                    self.restore(&address, existing);
                    return Err(StoreError::Forbidden(rejection));
                }
            },
            // Forward confirmed pushes along the peer graph.
            Authorized::ChainProof { .. } => true,
            Authorized::PeerSourced => false,
        };
        Ok((record, propagate))
    }

    async fn try_put(
        &self,
        address: Address,
        raw: Vec<u8>,
        authorization: WriteAuthorization,
    ) -> Result<WriteReceipt, StoreError> {
        let source = authorization.source();
        let write = decode_write(&raw, self.config.max_payload_size)?;
        let authorized = self.authorize(&write, authorization).await?;
        verify_signer(&write, &address)?;
        check_freshness(&write.metadata, self.clock.now(), self.config.clock_skew)?;

        let lock = self.lock_for(address);
        let applied = {
            let _guard = lock.lock().await;
            self.apply(address, raw, write, authorized, source)
        };
        drop(lock);
        self.release_lock(&address);
        let (record, propagate) = applied?;

        self.publisher
            .publish(KeyserverEvent::RecordAccepted {
                address,
                timestamp: record.timestamp(),
                source,
            })
            .await;
        if propagate {
            if let Some(txid) = record.txid {
                self.publisher
                    .publish(KeyserverEvent::PropagationReady {
                        address,
                        metadata_digest: record.metadata_digest,
                        txid,
                    })
                    .await;
            }
        }

        Ok(WriteReceipt {
            address,
            timestamp: record.timestamp(),
            metadata_digest: record.metadata_digest,
            source,
            propagating: propagate,
        })
    }

    /// Remove `address` if expired, under its lock. Returns the live record.
    async fn expire_locked(&self, address: &Address) -> Result<Option<StoredRecord>, StoreError> {
        let lock = self.lock_for(*address);
        let current = {
            let _guard = lock.lock().await;
            let now = self.clock.now();
            self.drop_if_expired(address, self.backend.get(address)?, now)
        };
        drop(lock);
        self.release_lock(address);
        current
    }
}

#[async_trait]
impl<B, G> MetadataStoreApi for MetadataStore<B, G>
where
    B: RecordBackend,
    G: PaymentGate,
{
    async fn put(
        &self,
        address: Address,
        raw: Vec<u8>,
        authorization: WriteAuthorization,
    ) -> Result<WriteReceipt, StoreError> {
        let source = authorization.source();
        let result = self.try_put(address, raw, authorization).await;
        match &result {
            Ok(receipt) => {
                metrics::RECORDS_STORED
                    .with_label_values(&[source.as_str()])
                    .inc();
                info!(
                    "[ks-03] Stored record for {} at {} ({}, propagating: {})",
                    address,
                    receipt.timestamp,
                    source.as_str(),
                    receipt.propagating
                );
            }
            Err(e) => {
                metrics::WRITES_REJECTED
                    .with_label_values(&[e.reason()])
                    .inc();
                debug!("[ks-03] Write for {} rejected: {}", address, e);
            }
        }
        result
    }

    async fn get(&self, address: &Address) -> Result<Option<StoredRecord>, StoreError> {
        match self.backend.get(address)? {
            Some(record) if record.is_expired(self.clock.now()) => {
                self.expire_locked(address).await
            }
            other => Ok(other),
        }
    }

    async fn prune_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let mut pruned = 0;
        for address in self.backend.addresses()? {
            let expired = self
                .backend
                .get(&address)?
                .is_some_and(|r| r.is_expired(now));
            if expired && self.expire_locked(&address).await?.is_none() {
                pruned += 1;
            }
        }
        if pruned > 0 {
            info!("[ks-03] Pruned {} expired record(s)", pruned);
        }
        Ok(pruned)
    }

    fn len(&self) -> usize {
        self.backend.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryBackend;
    use ks_01_commitment_ledger::{
        CommitmentLedgerApi, DemandTemplate, LedgerConfig, LedgerService, PaymentObservation,
        Redemption, TokenIssuer,
    };
    use shared_bus::{EventFilter, InMemoryEventBus};
    use shared_crypto::Secp256k1KeyPair;
    use shared_types::{AddressMetadata, CommitmentKey, Digest, Entry, MockTimeSource};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory backend whose writes can be switched off.
    #[derive(Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        fail_puts: AtomicBool,
    }

    impl RecordBackend for FlakyBackend {
        fn get(&self, address: &Address) -> Result<Option<StoredRecord>, StoreError> {
            self.inner.get(address)
        }

        fn put(&self, record: &StoredRecord) -> Result<(), StoreError> {
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("disk full".into()));
            }
            self.inner.put(record)
        }

        fn remove(&self, address: &Address) -> Result<bool, StoreError> {
            self.inner.remove(address)
        }

        fn addresses(&self) -> Result<Vec<Address>, StoreError> {
            self.inner.addresses()
        }

        fn len(&self) -> usize {
            self.inner.len()
        }
    }

    struct TestGate {
        ledger: Arc<LedgerService>,
        proof: parking_lot::Mutex<Result<u64, ChainProofError>>,
        refuse_redeem: parking_lot::Mutex<Option<TokenRejection>>,
    }

    #[async_trait]
    impl PaymentGate for TestGate {
        fn commit(&self, key: CommitmentKey, payload_len: usize) -> CommitResponse {
            self.ledger.commit(key, Some(payload_len))
        }

        fn check_token(
            &self,
            token: &str,
            key: &CommitmentKey,
        ) -> Result<Redemption, TokenRejection> {
            self.ledger.check_token(token, key)
        }

        fn redeem(
            &self,
            token: &str,
            key: &CommitmentKey,
            address: Address,
        ) -> Result<Redemption, TokenRejection> {
            if let Some(rejection) = *self.refuse_redeem.lock() {
                return Err(rejection);
            }
            self.ledger.redeem(token, key, address)
        }

        async fn verify_chain_proof(
            &self,
            _txid: TxId,
            _metadata_digest: &Digest,
            _payload_len: usize,
        ) -> Result<u64, ChainProofError> {
            self.proof.lock().clone()
        }
    }

    struct Fixture {
        clock: MockTimeSource,
        ledger: Arc<LedgerService>,
        gate: Arc<TestGate>,
        bus: Arc<InMemoryEventBus>,
        backend: Arc<FlakyBackend>,
        store: Arc<MetadataStore<FlakyBackend, TestGate>>,
        keys: Secp256k1KeyPair,
    }

    const NOW: u64 = 1_000_000;

    fn fixture() -> Fixture {
        let clock = MockTimeSource::new(NOW);
        let ledger = Arc::new(LedgerService::new(
            LedgerConfig::default(),
            DemandTemplate::default(),
            TokenIssuer::new([4; 32]),
            Arc::new(clock.clone()),
        ));
        let gate = Arc::new(TestGate {
            ledger: ledger.clone(),
            proof: parking_lot::Mutex::new(Ok(2)),
            refuse_redeem: parking_lot::Mutex::new(None),
        });
        let backend = Arc::new(FlakyBackend::default());
        let bus = Arc::new(InMemoryEventBus::new());
        let store = Arc::new(MetadataStore::new(
            StoreConfig::default(),
            backend.clone(),
            gate.clone(),
            bus.clone(),
            Arc::new(clock.clone()),
        ));
        Fixture {
            clock,
            ledger,
            gate,
            bus,
            backend,
            store,
            keys: Secp256k1KeyPair::generate(),
        }
    }

    fn signed(keys: &Secp256k1KeyPair, timestamp: u64, ttl: u64) -> Vec<u8> {
        let metadata = AddressMetadata {
            timestamp,
            ttl,
            entries: vec![Entry {
                headers: vec![],
                entry_data: timestamp.to_be_bytes().to_vec(),
            }],
        };
        keys.sign_metadata(&metadata).unwrap().encode().unwrap()
    }

    /// Commit and pay for `raw`, returning the token.
    fn pay(f: &Fixture, raw: &[u8], depth: u64) -> String {
        let write = decode_write(raw, usize::MAX).unwrap();
        f.ledger.commit(write.key, Some(write.payload_len()));
        f.ledger
            .record_payment(
                &write.key,
                PaymentObservation {
                    txid: TxId(write.key.metadata_digest),
                    amount: 10_000_000,
                    depth,
                },
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_without_token_returns_demand() {
        let f = fixture();
        let raw = signed(&f.keys, NOW, 600);
        let err = f
            .store
            .put(f.keys.address(), raw.clone(), WriteAuthorization::None)
            .await
            .unwrap_err();
        let StoreError::PaymentRequired(request) = err else {
            panic!("expected demand, got {err:?}");
        };
        let write = decode_write(&raw, usize::MAX).unwrap();
        assert_eq!(request.data_output(), Some(&write.key.metadata_digest[..]));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_paid_write_is_stored_verbatim() {
        let f = fixture();
        let raw = signed(&f.keys, NOW, 600);
        let token = pay(&f, &raw, 0);
        let mut events = f.bus.subscribe(EventFilter::all());

        let receipt = f
            .store
            .put(f.keys.address(), raw.clone(), WriteAuthorization::Bearer(token))
            .await
            .unwrap();
        assert!(!receipt.propagating);
        assert_eq!(f.ledger.pending_len(), 1);

        let record = f.store.get(&f.keys.address()).await.unwrap().unwrap();
        assert_eq!(record.raw, raw);
        assert_eq!(record.source, WriteSource::Client);
        assert!(matches!(
            events.recv().await,
            Some(KeyserverEvent::RecordAccepted { .. })
        ));
    }

    #[tokio::test]
    async fn test_confirmed_payment_propagates_at_once() {
        let f = fixture();
        let raw = signed(&f.keys, NOW, 600);
        let token = pay(&f, &raw, 2);
        let mut events = f.bus.subscribe(EventFilter::all());

        let receipt = f
            .store
            .put(f.keys.address(), raw, WriteAuthorization::Bearer(token))
            .await
            .unwrap();
        assert!(receipt.propagating);
        events.recv().await;
        assert!(matches!(
            events.recv().await,
            Some(KeyserverEvent::PropagationReady { .. })
        ));
    }

    #[tokio::test]
    async fn test_token_single_use() {
        let f = fixture();
        let raw = signed(&f.keys, NOW, 600);
        let token = pay(&f, &raw, 0);
        let auth = WriteAuthorization::Bearer(token);

        f.store.put(f.keys.address(), raw.clone(), auth.clone()).await.unwrap();
        let err = f.store.put(f.keys.address(), raw, auth).await.unwrap_err();
        assert_eq!(err, StoreError::Forbidden(TokenRejection::AlreadyUsed));
    }

    #[tokio::test]
    async fn test_token_for_other_payload_gets_fresh_demand() {
        let f = fixture();
        let paid = signed(&f.keys, NOW, 600);
        let token = pay(&f, &paid, 0);
        let other = signed(&f.keys, NOW + 1, 600);

        let err = f
            .store
            .put(f.keys.address(), other, WriteAuthorization::Bearer(token.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PaymentRequired(_)));
        assert!(f.store.is_empty());
        // The original token is still good for its own payload.
        let key = decode_write(&paid, usize::MAX).unwrap().key;
        assert!(f.ledger.check_token(&token, &key).is_ok());
    }

    #[tokio::test]
    async fn test_token_for_other_identity_is_forbidden() {
        let f = fixture();
        let mine = signed(&f.keys, NOW, 600);
        let token = pay(&f, &mine, 0);

        // Same payload bytes signed by someone else.
        let thief = Secp256k1KeyPair::generate();
        let mut wrapper = shared_types::AuthWrapper::decode(&mine).unwrap();
        wrapper.pub_key = thief.public_key();
        wrapper.signature = thief.sign(&wrapper.serialized_payload).to_vec();

        let err = f
            .store
            .put(
                thief.address(),
                wrapper.encode().unwrap(),
                WriteAuthorization::Bearer(token),
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Forbidden(TokenRejection::IdentityMismatch));
    }

    #[tokio::test]
    async fn test_bad_signer_does_not_consume_token() {
        let f = fixture();
        let raw = signed(&f.keys, NOW, 600);
        let token = pay(&f, &raw, 0);

        let err = f
            .store
            .put(Address([9; 20]), raw.clone(), WriteAuthorization::Bearer(token.clone()))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::AddressMismatch);
        let key = decode_write(&raw, usize::MAX).unwrap().key;
        assert!(f.ledger.check_token(&token, &key).is_ok());
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_token_unspent() {
        let f = fixture();
        let raw = signed(&f.keys, NOW, 600);
        let token = pay(&f, &raw, 0);
        let key = decode_write(&raw, usize::MAX).unwrap().key;
        f.backend.fail_puts.store(true, Ordering::SeqCst);

        let err = f
            .store
            .put(f.keys.address(), raw.clone(), WriteAuthorization::Bearer(token.clone()))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Backend("disk full".into()));
        assert!(f.ledger.check_token(&token, &key).is_ok());
        assert_eq!(f.ledger.pending_len(), 0);
        assert!(f.store.is_empty());

        // Once the disk recovers the same token still pays for the write.
        f.backend.fail_puts.store(false, Ordering::SeqCst);
        f.store
            .put(f.keys.address(), raw, WriteAuthorization::Bearer(token))
            .await
            .unwrap();
        assert_eq!(f.store.len(), 1);
        assert_eq!(f.ledger.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_failed_redemption_restores_previous_record() {
        let f = fixture();
        let first = signed(&f.keys, NOW - 10, 600);
        let token = pay(&f, &first, 0);
        f.store
            .put(f.keys.address(), first.clone(), WriteAuthorization::Bearer(token))
            .await
            .unwrap();

        let second = signed(&f.keys, NOW, 600);
        let token = pay(&f, &second, 0);
        *f.gate.refuse_redeem.lock() = Some(TokenRejection::Unknown);
        let err = f
            .store
            .put(f.keys.address(), second, WriteAuthorization::Bearer(token))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Forbidden(TokenRejection::Unknown));

        let record = f.store.get(&f.keys.address()).await.unwrap().unwrap();
        assert_eq!(record.raw, first);
    }

    #[tokio::test]
    async fn test_failed_redemption_of_first_write_leaves_nothing() {
        let f = fixture();
        let raw = signed(&f.keys, NOW, 600);
        let token = pay(&f, &raw, 0);
        *f.gate.refuse_redeem.lock() = Some(TokenRejection::Expired);

        let err = f
            .store
            .put(f.keys.address(), raw, WriteAuthorization::Bearer(token))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Forbidden(TokenRejection::Expired));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let f = fixture();
        let newer = signed(&f.keys, NOW, 600);
        let token = pay(&f, &newer, 0);
        f.store
            .put(f.keys.address(), newer.clone(), WriteAuthorization::Bearer(token))
            .await
            .unwrap();

        let older = signed(&f.keys, NOW - 10, 600);
        let older_token = pay(&f, &older, 0);
        let err = f
            .store
            .put(
                f.keys.address(),
                older.clone(),
                WriteAuthorization::Bearer(older_token.clone()),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                stored: NOW,
                incoming: NOW - 10
            }
        );
        let record = f.store.get(&f.keys.address()).await.unwrap().unwrap();
        assert_eq!(record.raw, newer);
        // Rejected writes keep their token.
        let key = decode_write(&older, usize::MAX).unwrap().key;
        assert!(f.ledger.check_token(&older_token, &key).is_ok());
    }

    #[tokio::test]
    async fn test_expired_record_is_replaced_by_older_write() {
        let f = fixture();
        let short = signed(&f.keys, NOW, 10);
        let token = pay(&f, &short, 0);
        f.store
            .put(f.keys.address(), short, WriteAuthorization::Bearer(token))
            .await
            .unwrap();

        f.clock.advance(11);
        let older = signed(&f.keys, NOW - 5, 600);
        let token = pay(&f, &older, 0);
        f.store
            .put(f.keys.address(), older.clone(), WriteAuthorization::Bearer(token))
            .await
            .unwrap();
        let record = f.store.get(&f.keys.address()).await.unwrap().unwrap();
        assert_eq!(record.raw, older);
    }

    #[tokio::test]
    async fn test_get_drops_expired_record() {
        let f = fixture();
        let raw = signed(&f.keys, NOW, 10);
        let token = pay(&f, &raw, 0);
        f.store
            .put(f.keys.address(), raw, WriteAuthorization::Bearer(token))
            .await
            .unwrap();

        f.clock.advance(10);
        assert!(f.store.get(&f.keys.address()).await.unwrap().is_some());
        f.clock.advance(1);
        assert!(f.store.get(&f.keys.address()).await.unwrap().is_none());
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_prune_expired() {
        let f = fixture();
        for ttl in [10, 20, 600] {
            let keys = Secp256k1KeyPair::generate();
            f.store
                .put(keys.address(), signed(&keys, NOW, ttl), WriteAuthorization::PeerSourced)
                .await
                .unwrap();
        }
        f.clock.advance(15);
        assert_eq!(f.store.prune_expired().await.unwrap(), 1);
        f.clock.advance(10);
        assert_eq!(f.store.prune_expired().await.unwrap(), 1);
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn test_implicit_commit_uses_existing_payment() {
        let f = fixture();
        let raw = signed(&f.keys, NOW, 600);
        pay(&f, &raw, 0);
        f.store
            .put(f.keys.address(), raw, WriteAuthorization::None)
            .await
            .unwrap();
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn test_chain_proof_write_forwards() {
        let f = fixture();
        let raw = signed(&f.keys, NOW, 600);
        let mut events = f.bus.subscribe(EventFilter::all());

        let receipt = f
            .store
            .put(f.keys.address(), raw, WriteAuthorization::ChainProof(TxId([7; 32])))
            .await
            .unwrap();
        assert!(receipt.propagating);
        assert_eq!(receipt.source, WriteSource::Push);
        events.recv().await;
        assert!(matches!(
            events.recv().await,
            Some(KeyserverEvent::PropagationReady { txid, .. }) if txid == TxId([7; 32])
        ));
    }

    #[tokio::test]
    async fn test_chain_proof_rejections() {
        let f = fixture();
        let raw = signed(&f.keys, NOW, 600);

        *f.gate.proof.lock() = Err(ChainProofError::Unconfirmed {
            depth: 1,
            required: 2,
        });
        let err = f
            .store
            .put(
                f.keys.address(),
                raw.clone(),
                WriteAuthorization::ChainProof(TxId([7; 32])),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        *f.gate.proof.lock() = Err(ChainProofError::NotFound);
        let err = f
            .store
            .put(
                f.keys.address(),
                raw.clone(),
                WriteAuthorization::ChainProof(TxId([7; 32])),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        *f.gate.proof.lock() = Err(ChainProofError::WrongDigest);
        let err = f
            .store
            .put(
                f.keys.address(),
                raw.clone(),
                WriteAuthorization::ChainProof(TxId([7; 32])),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ProofRejected(_)));

        *f.gate.proof.lock() = Err(ChainProofError::Oracle(
            ks_02_payment_verification::OracleError::Unavailable("down".into()),
        ));
        let err = f
            .store
            .put(f.keys.address(), raw, WriteAuthorization::ChainProof(TxId([7; 32])))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_peer_sourced_write_checks_signature_only() {
        let f = fixture();
        let raw = signed(&f.keys, NOW, 600);
        let receipt = f
            .store
            .put(f.keys.address(), raw.clone(), WriteAuthorization::PeerSourced)
            .await
            .unwrap();
        assert!(!receipt.propagating);
        assert!(f.ledger.is_empty());

        let stale = signed(&f.keys, NOW - 1_000, 10);
        assert!(matches!(
            f.store
                .put(f.keys.address(), stale, WriteAuthorization::PeerSourced)
                .await,
            Err(StoreError::Expired { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_writers_newest_wins() {
        let f = fixture();
        let writes: Vec<(Vec<u8>, String)> = (0..8)
            .map(|i| {
                let raw = signed(&f.keys, NOW + i, 600);
                let token = pay(&f, &raw, 0);
                (raw, token)
            })
            .collect();

        let handles: Vec<_> = writes
            .into_iter()
            .map(|(raw, token)| {
                let store = f.store.clone();
                let address = f.keys.address();
                tokio::spawn(async move {
                    store
                        .put(address, raw, WriteAuthorization::Bearer(token))
                        .await
                })
            })
            .collect();
        for handle in handles {
            let _ = handle.await.unwrap();
        }

        let record = f.store.get(&f.keys.address()).await.unwrap().unwrap();
        assert_eq!(record.timestamp(), NOW + 7);
        assert!(f.store.locks.is_empty());
    }
}
