//! # Confirmation Watcher
//!
//! Background task driving [`PaymentVerifier::poll_once`]. It wakes on
//! whichever comes first: a block notification from the oracle or the poll
//! interval. It exits when the shutdown signal flips.

use crate::ports::LedgerOracle;
use crate::service::PaymentVerifier;
use ks_01_commitment_ledger::CommitmentLedgerApi;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Confirmation watcher task.
pub struct ConfirmationWatcher<O, L>
where
    O: LedgerOracle,
    L: CommitmentLedgerApi,
{
    verifier: Arc<PaymentVerifier<O, L>>,
    shutdown: watch::Receiver<bool>,
}

impl<O, L> ConfirmationWatcher<O, L>
where
    O: LedgerOracle + 'static,
    L: CommitmentLedgerApi + 'static,
{
    pub fn new(verifier: Arc<PaymentVerifier<O, L>>, shutdown: watch::Receiver<bool>) -> Self {
        Self { verifier, shutdown }
    }

    /// Run until shutdown.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.verifier.config().poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut blocks = self.verifier.oracle().block_notifications();

        info!(
            "[ks-02] Confirmation watcher started (interval {:?}, block notifications: {})",
            self.verifier.config().poll_interval,
            blocks.is_some()
        );

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    info!("[ks-02] Shutdown signal received");
                    break;
                }
                _ = interval.tick() => {}
                height = next_block(&mut blocks) => {
                    debug!("[ks-02] New tip {}", height);
                }
            }
            if *self.shutdown.borrow() {
                break;
            }
            self.verifier.poll_once().await;
        }
    }
}

/// Resolves on the next tip change; pends forever without notifications.
async fn next_block(blocks: &mut Option<watch::Receiver<u64>>) -> u64 {
    match blocks {
        Some(rx) => {
            if rx.changed().await.is_ok() {
                *rx.borrow_and_update()
            } else {
                // Sender gone; fall back to the interval only.
                *blocks = None;
                std::future::pending().await
            }
        }
        None => std::future::pending().await,
    }
}
