//! # Ledger Service
//!
//! Thread-safe wrapper around [`CommitmentLedger`]. One `parking_lot::Mutex`
//! serializes every transition, which gives per-commitment exclusivity (and
//! idempotent concurrent commits) without ever being held across I/O.

use crate::domain::{
    Commitment, CommitOutcome, CommitmentLedger, DemandTemplate, LedgerConfig, LedgerError,
    LedgerTransition, PaymentObservation, Redemption, SweepReport, TokenIssuer, TokenRejection,
    TrackedPayment,
};
use crate::ports::{CommitResponse, CommitmentLedgerApi};
use ks_telemetry::metrics;
use parking_lot::Mutex;
use shared_types::{Address, CommitmentKey, TimeSource, TxId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Commitment ledger service.
pub struct LedgerService {
    ledger: Mutex<CommitmentLedger>,
    template: DemandTemplate,
    config: LedgerConfig,
    clock: Arc<dyn TimeSource>,
}

impl LedgerService {
    pub fn new(
        config: LedgerConfig,
        template: DemandTemplate,
        issuer: TokenIssuer,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            ledger: Mutex::new(CommitmentLedger::new(config, issuer)),
            template,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn template(&self) -> &DemandTemplate {
        &self.template
    }

    /// Number of redeemed writes waiting for confirmations.
    pub fn pending_len(&self) -> usize {
        self.ledger.lock().pending_len()
    }

    /// Number of live commitments.
    pub fn len(&self) -> usize {
        self.ledger.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.lock().is_empty()
    }
}

impl CommitmentLedgerApi for LedgerService {
    fn commit(&self, key: CommitmentKey, payload_size: Option<usize>) -> CommitResponse {
        let now = self.clock.now();
        let outcome = self.ledger.lock().commit(key, payload_size, now);
        match outcome {
            CommitOutcome::PaymentRequired {
                commitment,
                created,
            } => {
                if created {
                    metrics::COMMITMENTS_OPENED.inc();
                    info!(
                        "[ks-01] Commitment opened: {} requires {}",
                        key, commitment.required_amount
                    );
                } else {
                    debug!("[ks-01] Repeat commit for {}", key);
                }
                CommitResponse::PaymentRequired(
                    commitment.payment_request(&self.template, self.config.payment_window),
                )
            }
            CommitOutcome::AlreadyPaid { token } => {
                debug!("[ks-01] Commit for already paid {}", key);
                CommitResponse::Paid { token }
            }
        }
    }

    fn lookup(&self, key: &CommitmentKey) -> Option<Commitment> {
        self.ledger.lock().get(key).cloned()
    }

    fn record_payment(
        &self,
        key: &CommitmentKey,
        observation: PaymentObservation,
    ) -> Result<String, LedgerError> {
        let now = self.clock.now();
        let result = self.ledger.lock().record_payment(key, observation, now);
        match &result {
            Ok(_) => info!(
                "[ks-01] Payment recorded for {}: tx {} depth {}",
                key, observation.txid, observation.depth
            ),
            Err(e) => warn!("[ks-01] Payment rejected for {}: {}", key, e),
        }
        result
    }

    fn check_token(
        &self,
        token: &str,
        key: &CommitmentKey,
    ) -> Result<Redemption, TokenRejection> {
        let now = self.clock.now();
        self.ledger.lock().preview_redemption(token, key, now)
    }

    fn redeem(
        &self,
        token: &str,
        key: &CommitmentKey,
        address: Address,
    ) -> Result<Redemption, TokenRejection> {
        let now = self.clock.now();
        let redemption = self.ledger.lock().redeem(token, key, address, now)?;
        metrics::TOKENS_REDEEMED.inc();
        info!(
            "[ks-01] Token redeemed for {} (tx {}, ready: {})",
            address, redemption.txid, redemption.ready_to_propagate
        );
        Ok(redemption)
    }

    fn tracked_payments(&self) -> Vec<TrackedPayment> {
        self.ledger.lock().tracked_payments()
    }

    fn apply_depth(&self, txid: &TxId, depth: Option<u64>) -> Vec<LedgerTransition> {
        self.ledger.lock().apply_depth(txid, depth)
    }

    fn open_commitments(&self) -> Vec<Commitment> {
        let now = self.clock.now();
        self.ledger.lock().open_commitments(now)
    }

    fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let report = self.ledger.lock().sweep(now);
        if !report.is_empty() {
            metrics::LEDGER_EXPIRED
                .with_label_values(&["commitment"])
                .inc_by(report.commitments as f64);
            metrics::LEDGER_EXPIRED
                .with_label_values(&["token"])
                .inc_by(report.tokens as f64);
            metrics::LEDGER_EXPIRED
                .with_label_values(&["pending_push"])
                .inc_by(report.pending as f64);
            debug!("[ks-01] Sweep removed {:?}", report);
        }
        report
    }

    fn confirmation_depth(&self) -> u64 {
        self.config.confirmation_depth
    }

    fn required_amount(&self, payload_len: usize) -> u64 {
        self.config.fees.required_amount(payload_len)
    }
}
