//! Periodic pruning of expired records and ledger garbage collection.

use std::sync::Arc;
use std::time::Duration;

use ks_01_commitment_ledger::CommitmentLedgerApi;
use ks_03_metadata_store::MetadataStoreApi;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct Maintenance {
    ledger: Arc<dyn CommitmentLedgerApi>,
    store: Arc<dyn MetadataStoreApi>,
    prune_interval: Duration,
    sweep_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Maintenance {
    pub fn new(
        ledger: Arc<dyn CommitmentLedgerApi>,
        store: Arc<dyn MetadataStoreApi>,
        prune_interval: Duration,
        sweep_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ledger,
            store,
            prune_interval,
            sweep_interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut prune = tokio::time::interval(self.prune_interval);
        prune.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "[runtime] Maintenance started (prune {:?}, sweep {:?})",
            self.prune_interval, self.sweep_interval
        );

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    info!("[runtime] Maintenance stopping");
                    break;
                }
                _ = prune.tick() => self.prune().await,
                _ = sweep.tick() => self.sweep(),
            }
        }
    }

    async fn prune(&self) {
        match self.store.prune_expired().await {
            Ok(0) => {}
            Ok(removed) => info!("[ks-03] Pruned {} expired record(s)", removed),
            Err(e) => warn!("[ks-03] Prune failed: {}", e),
        }
    }

    fn sweep(&self) {
        let report = self.ledger.sweep();
        if !report.is_empty() {
            debug!(
                "[ks-01] Swept {} commitment(s), {} token(s), {} pending push(es)",
                report.commitments, report.tokens, report.pending
            );
        }
    }
}
