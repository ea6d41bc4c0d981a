//! # Replication Between Nodes
//!
//! Push is gated on confirmation depth; pull fills read misses from peers.
//!
//! ```text
//! client ──write──→ node 0 ──(depth ≥ 2)── push ──→ node 1 ──forward──→ node 2
//!                     ↑                                 │
//!                     └─────────── pull on miss ────────┘
//! ```
//!
//! Every cluster shares one devnet chain; tests mine blocks by hand.

#[cfg(test)]
mod tests {
    use crate::harness::{eventually, signed_record, unix_now, Cluster};
    use reqwest::StatusCode;
    use shared_crypto::Secp256k1KeyPair;
    use shared_types::PeerStatus;
    use std::time::Duration;
    use tokio::net::TcpListener;

    const PROPAGATION: Duration = Duration::from_secs(5);

    /// Long enough for a watcher poll and a push attempt.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1_500)).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_push_waits_for_confirmation_depth() {
        // node 0 pushes to node 1; node 1 has no peers, so it never pulls.
        let cluster = Cluster::start(&[&[1], &[]]).await;
        let (origin, peer) = (cluster.node(0), cluster.node(1));
        let keys = Secp256k1KeyPair::generate();
        let address = keys.address();
        let raw = signed_record(&keys, unix_now(), "bitcoincash:qq-gated");

        let demand = origin.demand_for(&address, &raw).await;
        let (authorization, txid) = origin.settle(&demand).await;
        assert_eq!(cluster.chain.depth_of(&txid), Some(0));

        let response = origin.put(&address, &raw, Some(&authorization)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(origin.get(&address).await.status(), StatusCode::OK);

        cluster.chain.mine_block();
        settle().await;
        assert_eq!(peer.get(&address).await.status(), StatusCode::NOT_FOUND);

        cluster.chain.mine_block();
        assert!(
            peer.wait_for_record(&address, &raw, PROPAGATION).await,
            "record never reached the peer after {} confirmations",
            cluster.chain.depth_of(&txid).unwrap_or_default()
        );

        let response = peer.get(&address).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.bytes().await.unwrap().to_vec(), raw);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_read_miss_pulls_identical_bytes() {
        // node 0 pulls from node 1; nothing is ever confirmed.
        let cluster = Cluster::start(&[&[1], &[]]).await;
        let (reader, holder) = (cluster.node(0), cluster.node(1));
        let keys = Secp256k1KeyPair::generate();
        let address = keys.address();
        let raw = signed_record(&keys, unix_now(), "bitcoincash:qq-pulled");

        holder.paid_write(&address, &raw).await;
        assert_eq!(reader.local_record(&address).await, None);

        let response = reader.get(&address).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.bytes().await.unwrap().to_vec(), raw);

        // Merged into the reader's own store.
        assert_eq!(reader.local_record(&address).await, Some(raw));
        assert_eq!(reader.health().await.records, 1);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_read_miss_everywhere_is_not_found() {
        let cluster = Cluster::start(&[&[1], &[]]).await;
        let address = Secp256k1KeyPair::generate().address();

        assert_eq!(cluster.node(0).get(&address).await.status(), StatusCode::NOT_FOUND);
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pushed_records_are_forwarded() {
        // 0 → 1 → 2: node 2 only hears about the record through node 1.
        let cluster = Cluster::start(&[&[1], &[2], &[]]).await;
        let keys = Secp256k1KeyPair::generate();
        let address = keys.address();
        let raw = signed_record(&keys, unix_now(), "bitcoincash:qq-forwarded");

        cluster.node(0).paid_write(&address, &raw).await;
        cluster.chain.mine_blocks(2);

        let last = cluster.node(2);
        assert!(last.wait_for_record(&address, &raw, PROPAGATION).await);
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mutual_peers_converge_without_looping() {
        let cluster = Cluster::start(&[&[1], &[0]]).await;
        let (origin, peer) = (cluster.node(0), cluster.node(1));
        let keys = Secp256k1KeyPair::generate();
        let address = keys.address();
        let raw = signed_record(&keys, unix_now(), "bitcoincash:qq-mutual");

        origin.paid_write(&address, &raw).await;
        cluster.chain.mine_blocks(2);

        assert!(peer.wait_for_record(&address, &raw, PROPAGATION).await);
        assert!(
            eventually(PROPAGATION, || async move {
                origin.peers().await.peers[0].status == PeerStatus::Reachable
            })
            .await
        );

        // The echo back to the origin is a stale write and changes nothing.
        settle().await;
        assert_eq!(origin.local_record(&address).await, Some(raw.clone()));
        assert_eq!(origin.health().await.records, 1);
        assert_eq!(peer.health().await.records, 1);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_newer_write_replaces_replica() {
        let cluster = Cluster::start(&[&[1], &[]]).await;
        let (origin, peer) = (cluster.node(0), cluster.node(1));
        let keys = Secp256k1KeyPair::generate();
        let address = keys.address();
        let now = unix_now();
        let first = signed_record(&keys, now - 10, "bitcoincash:qq-first");
        let second = signed_record(&keys, now - 5, "bitcoincash:qq-second");

        origin.paid_write(&address, &first).await;
        cluster.chain.mine_blocks(2);
        assert!(peer.wait_for_record(&address, &first, PROPAGATION).await);

        origin.paid_write(&address, &second).await;
        cluster.chain.mine_blocks(2);
        assert!(peer.wait_for_record(&address, &second, PROPAGATION).await);
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reorged_payment_never_propagates() {
        let cluster = Cluster::start(&[&[1], &[]]).await;
        let (origin, peer) = (cluster.node(0), cluster.node(1));
        let keys = Secp256k1KeyPair::generate();
        let address = keys.address();
        let raw = signed_record(&keys, unix_now(), "bitcoincash:qq-orphaned");

        let (_, txid) = origin.paid_write(&address, &raw).await;
        cluster.chain.mine_block();
        assert_eq!(cluster.chain.reorg(1), vec![txid]);
        settle().await;

        cluster.chain.mine_blocks(2);
        settle().await;
        assert_eq!(peer.local_record(&address).await, None);

        // The accepted write itself is not retracted.
        assert_eq!(origin.local_record(&address).await, Some(raw));
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dead_peer_does_not_block_live_one() {
        let dead = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let cluster = Cluster::start_with(&[&[1], &[]], move |index, config| {
            if index == 0 {
                config.gossip.peers.insert(0, dead.clone());
            }
        })
        .await;
        let (origin, peer) = (cluster.node(0), cluster.node(1));
        let keys = Secp256k1KeyPair::generate();
        let address = keys.address();
        let raw = signed_record(&keys, unix_now(), "bitcoincash:qq-resilient");

        origin.paid_write(&address, &raw).await;
        cluster.chain.mine_blocks(2);

        assert!(peer.wait_for_record(&address, &raw, PROPAGATION).await);
        assert!(
            eventually(PROPAGATION, || async move {
                let peers = origin.peers().await.peers;
                peers[0].consecutive_failures > 0 && peers[1].status == PeerStatus::Reachable
            })
            .await
        );
        cluster.shutdown().await;
    }
}
