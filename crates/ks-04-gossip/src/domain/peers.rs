//! # Peer Table
//!
//! The peer set is fixed at startup; only health bookkeeping changes.
//!
//! | Event | `status` | `consecutive_failures` | `last_success` |
//! |-------|----------|------------------------|----------------|
//! | any HTTP answer | `Reachable` | reset to 0 | now |
//! | timeout / connect error / 5xx | `Unreachable` | +1 | unchanged |

use rand::seq::SliceRandom;
use rand::Rng;
use shared_types::{PeerRecord, PeerStatus};

#[derive(Debug, Clone, Default)]
pub struct PeerTable {
    peers: Vec<PeerRecord>,
}

impl PeerTable {
    #[must_use]
    pub fn new<I, U>(urls: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<String>,
    {
        let mut peers: Vec<PeerRecord> = Vec::new();
        for url in urls {
            let record = PeerRecord::new(url);
            if !peers.iter().any(|p| p.url == record.url) {
                peers.push(record);
            }
        }
        Self { peers }
    }

    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.peers.iter().map(|p| p.url.clone()).collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.peers.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn record_success(&mut self, url: &str, now: u64) {
        if let Some(peer) = self.peers.iter_mut().find(|p| p.url == url) {
            peer.status = PeerStatus::Reachable;
            peer.consecutive_failures = 0;
            peer.last_success = Some(now);
        }
    }

    pub fn record_failure(&mut self, url: &str) {
        if let Some(peer) = self.peers.iter_mut().find(|p| p.url == url) {
            peer.status = PeerStatus::Unreachable;
            peer.consecutive_failures = peer.consecutive_failures.saturating_add(1);
        }
    }
}

/// Random sample of `fanout` peers, or all of them when `fanout` is zero or
/// covers the whole set.
pub fn select_peers<R: Rng + ?Sized>(urls: &[String], fanout: usize, rng: &mut R) -> Vec<String> {
    if fanout == 0 || fanout >= urls.len() {
        let mut all = urls.to_vec();
        all.shuffle(rng);
        return all;
    }
    urls.choose_multiple(rng, fanout).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_duplicate_urls_collapse() {
        let table = PeerTable::new(["http://a:1/", "http://a:1", "http://b:1"]);
        assert_eq!(table.urls(), vec!["http://a:1", "http://b:1"]);
    }

    #[test]
    fn test_health_bookkeeping() {
        let mut table = PeerTable::new(["http://a:1"]);
        table.record_failure("http://a:1");
        table.record_failure("http://a:1");
        let peer = &table.snapshot()[0];
        assert_eq!(peer.status, PeerStatus::Unreachable);
        assert_eq!(peer.consecutive_failures, 2);

        table.record_success("http://a:1", 42);
        let peer = &table.snapshot()[0];
        assert_eq!(peer.status, PeerStatus::Reachable);
        assert_eq!(peer.consecutive_failures, 0);
        assert_eq!(peer.last_success, Some(42));

        // Unknown peers are ignored.
        table.record_failure("http://z:1");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_select_peers() {
        let urls: Vec<String> = (0..6).map(|i| format!("http://p{i}:1")).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let sample = select_peers(&urls, 3, &mut rng);
        assert_eq!(sample.len(), 3);
        assert!(sample.iter().all(|u| urls.contains(u)));

        let mut all = select_peers(&urls, 0, &mut rng);
        all.sort();
        assert_eq!(all, urls);
        assert_eq!(select_peers(&urls, 10, &mut rng).len(), 6);
        assert!(select_peers(&[], 3, &mut rng).is_empty());
    }
}
