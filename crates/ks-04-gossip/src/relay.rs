//! # Push Relay
//!
//! Background task turning `PropagationReady` events into pushes. Push tasks
//! are detached: a slow peer never delays the next event. Events arrive on a
//! [`WorkQueue`], so a burst of other bus traffic cannot crowd one out.

use crate::ports::{LocalStore, PeerTransport};
use crate::service::GossipEngine;
use shared_bus::{KeyserverEvent, WorkQueue};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

pub struct GossipRelay<T, S>
where
    T: PeerTransport,
    S: LocalStore,
{
    engine: Arc<GossipEngine<T, S>>,
    events: WorkQueue,
    shutdown: watch::Receiver<bool>,
}

impl<T, S> GossipRelay<T, S>
where
    T: PeerTransport + 'static,
    S: LocalStore + 'static,
{
    /// `events` should be a work queue filtered to the gossip topic.
    pub fn new(
        engine: Arc<GossipEngine<T, S>>,
        events: WorkQueue,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            events,
            shutdown,
        }
    }

    /// Run until shutdown or until the bus closes.
    pub async fn run(mut self) {
        info!(
            "[ks-04] Push relay started ({} peer(s))",
            self.engine.config().peers.len()
        );
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    info!("[ks-04] Shutdown signal received");
                    break;
                }
                event = self.events.recv() => match event {
                    Some(KeyserverEvent::PropagationReady { address, metadata_digest, txid }) => {
                        self.engine.push(address, metadata_digest, txid).await;
                    }
                    Some(KeyserverEvent::PropagationCancelled { address, txid }) => {
                        debug!("[ks-04] Push of {} cancelled ({} reverted)", address, txid);
                    }
                    Some(_) => {}
                    None => {
                        info!("[ks-04] Event bus closed");
                        break;
                    }
                },
            }
        }
    }
}
