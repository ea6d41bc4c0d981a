//! # Payment Verifier Service
//!
//! Bridges the ledger oracle and the commitment ledger.
//!
//! ## Direct path (`POST /payments`)
//!
//! ```text
//! Payment ──merchant_data──→ CommitmentKey ──lookup──→ Commitment
//!    │
//!    └─ for each raw tx: broadcast → transaction(txid) → match_payment
//!                                                          │
//!                           ledger.record_payment ←────────┘ → token + ack
//! ```
//!
//! Every oracle call carries `oracle_timeout` and transient failures are
//! retried per `retry`; exhausting the budget surfaces `PaymentError::Oracle`.
//!
//! ## Watcher path
//!
//! [`PaymentVerifier::poll_once`] snapshots tracked payments, queries the
//! oracle with no ledger lock held, then applies each depth and publishes the
//! resulting events. A failed query is skipped for the cycle; it is never
//! mistaken for a reorg.

use crate::domain::{
    check_chain_proof, match_payment, ChainProofError, Mismatch, OracleError, PaymentError,
    PaymentReceipt, PollReport, VerifierConfig,
};
use crate::ports::{LedgerOracle, PaymentVerificationApi};
use async_trait::async_trait;
use ks_01_commitment_ledger::{CommitmentLedgerApi, LedgerTransition, PaymentObservation};
use ks_telemetry::metrics;
use shared_bus::{EventPublisher, KeyserverEvent};
use shared_types::{CommitmentKey, Digest, Payment, PaymentAck, TxId};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Payment verifier.
///
/// Generic over the oracle `O` and the ledger `L`; both are shared via `Arc`
/// with the rest of the node.
pub struct PaymentVerifier<O, L>
where
    O: LedgerOracle,
    L: CommitmentLedgerApi,
{
    config: VerifierConfig,
    /// Memo echoed in every `PaymentAck`.
    ack_memo: Option<String>,
    oracle: Arc<O>,
    ledger: Arc<L>,
    publisher: Arc<dyn EventPublisher>,
}

impl<O, L> PaymentVerifier<O, L>
where
    O: LedgerOracle,
    L: CommitmentLedgerApi,
{
    pub fn new(
        config: VerifierConfig,
        ack_memo: Option<String>,
        oracle: Arc<O>,
        ledger: Arc<L>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            config,
            ack_memo,
            oracle,
            ledger,
            publisher,
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn oracle(&self) -> &Arc<O> {
        &self.oracle
    }

    /// Run one oracle call under the timeout and retry policy.
    async fn call<T, F, Fut>(&self, name: &'static str, mut op: F) -> Result<T, OracleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OracleError>>,
    {
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(self.config.oracle_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(OracleError::Timeout(self.config.oracle_timeout)),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) => {
                    metrics::ORACLE_ERRORS.with_label_values(&[name]).inc();
                    if !e.is_transient() || !self.config.retry.should_retry(attempt) {
                        warn!("[ks-02] Oracle {} failed after {} attempt(s): {}", name, attempt, e);
                        return Err(e);
                    }
                    let delay = self.config.retry.delay_after(attempt);
                    debug!("[ks-02] Oracle {} failed ({}), retrying in {:?}", name, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn receipt(&self, payment: Payment, token: String, txid: TxId, depth: u64) -> PaymentReceipt {
        PaymentReceipt {
            ack: PaymentAck {
                payment,
                memo: self.ack_memo.clone(),
            },
            token,
            txid,
            depth,
        }
    }

    async fn try_process(&self, payment: Payment) -> Result<PaymentReceipt, PaymentError> {
        let key = payment
            .commitment_key()
            .map_err(|e| PaymentError::Malformed(format!("merchant data: {e}")))?;
        if payment.transactions.is_empty() {
            return Err(PaymentError::Malformed(
                "payment carries no transactions".to_string(),
            ));
        }

        let commitment = self
            .ledger
            .lookup(&key)
            .ok_or(PaymentError::UnknownCommitment(key))?;

        // Paid already: hand the same token back.
        if let (Some(token), Some(observed)) = (commitment.token.clone(), commitment.payment) {
            debug!("[ks-02] Payment for {} already recorded", key);
            return Ok(self.receipt(payment, token, observed.txid, observed.depth));
        }

        let mut failure = PaymentError::WrongDigest { key };
        for raw in &payment.transactions {
            let raw = raw.as_slice();
            let oracle = &self.oracle;
            let txid = self.call("broadcast", move || oracle.broadcast(raw)).await?;
            let txid_ref = &txid;
            let Some(tx) = self
                .call("transaction", move || oracle.transaction(txid_ref))
                .await?
            else {
                failure = PaymentError::NotObserved { key };
                continue;
            };

            match match_payment(
                &tx,
                &key.metadata_digest,
                &self.config.payee,
                commitment.required_amount,
            ) {
                Ok(amount) => {
                    let observation = PaymentObservation {
                        txid,
                        amount,
                        depth: tx.depth,
                    };
                    let token = self
                        .ledger
                        .record_payment(&key, observation)
                        .map_err(|e| PaymentError::from_ledger(key, e))?;
                    self.publisher
                        .publish(KeyserverEvent::PaymentAccepted {
                            key,
                            txid,
                            depth: tx.depth,
                        })
                        .await;
                    return Ok(self.receipt(payment, token, txid, tx.depth));
                }
                Err(Mismatch::Underpaid { required, paid }) => {
                    failure = PaymentError::Insufficient {
                        key,
                        required,
                        paid,
                    };
                }
                Err(Mismatch::MissingData) => {}
            }
        }
        Err(failure)
    }

    // =========================================================================
    // CONFIRMATION WATCHING
    // =========================================================================

    /// One watcher cycle: poll every tracked payment, then optionally scan
    /// open commitments for out-of-band payments.
    pub async fn poll_once(&self) -> PollReport {
        let mut report = PollReport::default();

        let txids: BTreeSet<TxId> = self
            .ledger
            .tracked_payments()
            .iter()
            .map(|t| t.txid())
            .collect();

        for txid in txids {
            report.polled += 1;
            let depth = match tokio::time::timeout(
                self.config.oracle_timeout,
                self.oracle.transaction(&txid),
            )
            .await
            {
                Ok(Ok(tx)) => tx.map(|t| t.depth),
                Ok(Err(e)) => {
                    self.note_poll_failure(&txid, &e, &mut report);
                    continue;
                }
                Err(_) => {
                    let e = OracleError::Timeout(self.config.oracle_timeout);
                    self.note_poll_failure(&txid, &e, &mut report);
                    continue;
                }
            };

            for transition in self.ledger.apply_depth(&txid, depth) {
                self.publish_transition(transition, &mut report).await;
            }
        }

        if self.config.scan_out_of_band {
            self.scan_open_commitments(&mut report).await;
        }

        if report.confirmed + report.reverted + report.released + report.discovered > 0 {
            info!("[ks-02] Watcher cycle: {:?}", report);
        }
        report
    }

    fn note_poll_failure(&self, txid: &TxId, err: &OracleError, report: &mut PollReport) {
        report.oracle_failures += 1;
        metrics::ORACLE_ERRORS.with_label_values(&["poll"]).inc();
        warn!("[ks-02] Depth query for {} failed: {}", txid, err);
    }

    async fn publish_transition(&self, transition: LedgerTransition, report: &mut PollReport) {
        let event = match transition {
            LedgerTransition::Confirmed { key, txid, depth } => {
                report.confirmed += 1;
                metrics::PAYMENTS_CONFIRMED.inc();
                info!("[ks-02] Payment {} for {} confirmed at depth {}", txid, key, depth);
                KeyserverEvent::PaymentConfirmed { key, txid, depth }
            }
            LedgerTransition::Reverted { key, txid } => {
                report.reverted += 1;
                metrics::PAYMENTS_REORGED.inc();
                warn!("[ks-02] Payment {} for {} vanished; commitment reopened", txid, key);
                KeyserverEvent::PaymentReverted { key, txid }
            }
            LedgerTransition::ReadyToPropagate {
                address,
                metadata_digest,
                txid,
            } => {
                report.released += 1;
                info!("[ks-02] Record for {} ready to propagate", address);
                KeyserverEvent::PropagationReady {
                    address,
                    metadata_digest,
                    txid,
                }
            }
            LedgerTransition::PropagationCancelled { address, txid } => {
                report.cancelled += 1;
                metrics::PAYMENTS_REORGED.inc();
                warn!(
                    "[ks-02] Payment {} behind {} vanished before confirmation; push cancelled",
                    txid, address
                );
                KeyserverEvent::PropagationCancelled { address, txid }
            }
        };
        self.publisher.publish(event).await;
    }

    async fn scan_open_commitments(&self, report: &mut PollReport) {
        for commitment in self.ledger.open_commitments() {
            let key = commitment.key;
            let found = match tokio::time::timeout(
                self.config.oracle_timeout,
                self.oracle.find_by_data(&key.metadata_digest),
            )
            .await
            {
                Ok(Ok(found)) => found,
                Ok(Err(e)) => {
                    self.note_scan_failure(&key, &e, report);
                    continue;
                }
                Err(_) => {
                    let e = OracleError::Timeout(self.config.oracle_timeout);
                    self.note_scan_failure(&key, &e, report);
                    continue;
                }
            };

            let matched = found.iter().find_map(|tx| {
                match_payment(
                    tx,
                    &key.metadata_digest,
                    &self.config.payee,
                    commitment.required_amount,
                )
                .ok()
                .map(|amount| PaymentObservation {
                    txid: tx.txid,
                    amount,
                    depth: tx.depth,
                })
            });

            if let Some(observation) = matched {
                if self.ledger.record_payment(&key, observation).is_ok() {
                    report.discovered += 1;
                    self.publisher
                        .publish(KeyserverEvent::PaymentAccepted {
                            key,
                            txid: observation.txid,
                            depth: observation.depth,
                        })
                        .await;
                }
            }
        }
    }

    fn note_scan_failure(&self, key: &CommitmentKey, err: &OracleError, report: &mut PollReport) {
        report.oracle_failures += 1;
        metrics::ORACLE_ERRORS.with_label_values(&["scan"]).inc();
        debug!("[ks-02] Out-of-band scan for {} failed: {}", key, err);
    }
}

#[async_trait]
impl<O, L> PaymentVerificationApi for PaymentVerifier<O, L>
where
    O: LedgerOracle,
    L: CommitmentLedgerApi,
{
    async fn process_payment(&self, payment: Payment) -> Result<PaymentReceipt, PaymentError> {
        let result = self.try_process(payment).await;
        match &result {
            Ok(receipt) => {
                metrics::PAYMENTS.with_label_values(&["accepted"]).inc();
                info!(
                    "[ks-02] Payment accepted: tx {} at depth {}",
                    receipt.txid, receipt.depth
                );
            }
            Err(e) => {
                metrics::PAYMENTS.with_label_values(&[e.outcome()]).inc();
                debug!("[ks-02] Payment not accepted: {}", e);
            }
        }
        result
    }

    async fn verify_chain_proof(
        &self,
        txid: TxId,
        metadata_digest: &Digest,
        payload_len: usize,
    ) -> Result<u64, ChainProofError> {
        let oracle = &self.oracle;
        let txid_ref = &txid;
        let tx = self
            .call("transaction", move || oracle.transaction(txid_ref))
            .await?
            .ok_or(ChainProofError::NotFound)?;
        check_chain_proof(
            &tx,
            metadata_digest,
            self.ledger.confirmation_depth(),
            self.ledger.required_amount(payload_len),
        )
    }
}
