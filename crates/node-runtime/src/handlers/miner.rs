//! Mines devnet blocks on a timer so payments gain confirmations without an
//! external chain.

use std::sync::Arc;
use std::time::Duration;

use ks_02_payment_verification::InMemoryLedger;
use tokio::sync::watch;
use tracing::{debug, info};

pub struct DevnetMiner {
    chain: Arc<InMemoryLedger>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl DevnetMiner {
    pub fn new(chain: Arc<InMemoryLedger>, interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            chain,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick completes immediately; skip it so block 1 arrives
        // one full interval after startup.
        ticker.tick().await;
        info!("[devnet] Miner started (one block every {:?})", self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    info!("[devnet] Miner stopping at height {}", self.chain.height());
                    break;
                }
                _ = ticker.tick() => {
                    let height = self.chain.mine_block();
                    debug!("[devnet] Mined block {}", height);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_mines_on_each_interval_until_shutdown() {
        let chain = Arc::new(InMemoryLedger::new());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(DevnetMiner::new(chain.clone(), Duration::from_secs(10), rx).run());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(chain.height(), 2);

        tx.send(true).unwrap();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(chain.height(), 2);
    }
}
