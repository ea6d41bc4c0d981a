//! Logs every bus event at debug level, and reverted payments at warn.

use shared_bus::{KeyserverEvent, Subscription};
use tokio::sync::watch;
use tracing::{debug, warn};

pub struct EventLogger {
    events: Subscription,
    shutdown: watch::Receiver<bool>,
}

impl EventLogger {
    pub fn new(events: Subscription, shutdown: watch::Receiver<bool>) -> Self {
        Self { events, shutdown }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => break,
                event = self.events.recv() => match event {
                    Some(event) => log_event(&event),
                    None => break,
                },
            }
        }
    }
}

fn log_event(event: &KeyserverEvent) {
    match event {
        KeyserverEvent::PaymentReverted { key, txid } => {
            warn!("[bus] Payment {} for commitment {:?} left the chain", txid, key);
        }
        KeyserverEvent::PropagationCancelled { address, txid } => {
            warn!("[bus] Push of {} cancelled, {} reverted", address, txid);
        }
        other => debug!(
            "[bus] {:?} from ks-0{}",
            other.topic(),
            other.source_subsystem()
        ),
    }
}
