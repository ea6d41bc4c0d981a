//! # Single-Node Write Flow
//!
//! commit → 402 demand → payment → token → write → read, against one node
//! serving real HTTP.

#[cfg(test)]
mod tests {
    use crate::client::{payment_for, KeyserverClient};
    use crate::harness::{signed_record, test_config, unix_now, Cluster};
    use node_runtime::{KeyserverNode, NodeConfig, NodeRuntime};
    use reqwest::header::AUTHORIZATION;
    use reqwest::StatusCode;
    use shared_crypto::{digest, Secp256k1KeyPair};
    use shared_types::{CommitRequest, PaymentAck, PaymentRequest};

    fn commit_request(keys: &Secp256k1KeyPair, demand: &PaymentRequest) -> CommitRequest {
        CommitRequest {
            pubkey_digest: hex::encode(digest(&keys.public_key())),
            metadata_digest: hex::encode(demand.data_output().unwrap()),
            payload_size: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_paid_write_round_trip() {
        let cluster = Cluster::start(&[&[]]).await;
        let node = cluster.node(0);
        let keys = Secp256k1KeyPair::generate();
        let address = keys.address();
        let raw = signed_record(&keys, unix_now(), "bitcoincash:qq-first");

        // A write without a token is an implicit commit.
        let demand = node.demand_for(&address, &raw).await;
        assert_eq!(demand.payment_url, "/payments");

        // An explicit commit for the same pair returns the same demand.
        let response = node.commit(&commit_request(&keys, &demand)).await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let again: PaymentRequest = response.json().await.unwrap();
        assert_eq!(again.merchant_data, demand.merchant_data);
        assert_eq!(again.required_amount, demand.required_amount);

        let (authorization, txid) = node.settle(&demand).await;
        assert!(authorization.starts_with("POP "));
        assert_eq!(cluster.chain.depth_of(&txid), Some(0));

        // Once paid, committing again re-delivers the token.
        let response = node.commit(&commit_request(&keys, &demand)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[AUTHORIZATION].to_str().unwrap(), authorization);

        let response = node.put(&address, &raw, Some(&authorization)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = node.get(&address).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.bytes().await.unwrap().to_vec(), raw);
        assert_eq!(node.health().await.records, 1);

        // Single use.
        let response = node.put(&address, &raw, Some(&authorization)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_payment_resubmission_returns_same_token() {
        let cluster = Cluster::start(&[&[]]).await;
        let node = cluster.node(0);
        let keys = Secp256k1KeyPair::generate();
        let raw = signed_record(&keys, unix_now(), "bitcoincash:qq-resubmit");

        let demand = node.demand_for(&keys.address(), &raw).await;
        let (payment, _) = payment_for(&demand, demand.required_amount);

        let first = node.pay(&payment).await;
        assert_eq!(first.status(), StatusCode::OK);
        let first_token = first.headers()[AUTHORIZATION].clone();
        let ack: PaymentAck = first.json().await.unwrap();
        assert_eq!(ack.payment, payment);
        assert_eq!(ack.memo.as_deref(), Some("Thanks for your custom!"));

        let second = node.pay(&payment).await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers()[AUTHORIZATION], first_token);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_underpayment_and_unknown_commitment() {
        let cluster = Cluster::start(&[&[]]).await;
        let node = cluster.node(0);
        let keys = Secp256k1KeyPair::generate();
        let raw = signed_record(&keys, unix_now(), "bitcoincash:qq-cheap");

        let demand = node.demand_for(&keys.address(), &raw).await;
        let (short, _) = payment_for(&demand, demand.required_amount - 1);
        let response = node.pay(&short).await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let repeated: PaymentRequest = response.json().await.unwrap();
        assert_eq!(repeated.required_amount, demand.required_amount);

        let mut stranger = demand.clone();
        stranger.merchant_data = [7u8; 64].to_vec();
        let (payment, _) = payment_for(&stranger, demand.required_amount);
        let response = node.pay(&payment).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Nothing was stored along the way.
        assert_eq!(node.health().await.records, 0);
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_older_write_conflicts_and_store_is_unchanged() {
        let cluster = Cluster::start(&[&[]]).await;
        let node = cluster.node(0);
        let keys = Secp256k1KeyPair::generate();
        let address = keys.address();
        let now = unix_now();
        let newer = signed_record(&keys, now, "bitcoincash:qq-newer");
        let older = signed_record(&keys, now - 30, "bitcoincash:qq-older");

        node.paid_write(&address, &newer).await;

        let demand = node.demand_for(&address, &older).await;
        let (authorization, _) = node.settle(&demand).await;
        let response = node.put(&address, &older, Some(&authorization)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        assert_eq!(node.local_record(&address).await, Some(newer));
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wrong_address_is_rejected_without_spending_the_token() {
        let cluster = Cluster::start(&[&[]]).await;
        let node = cluster.node(0);
        let keys = Secp256k1KeyPair::generate();
        let other = Secp256k1KeyPair::generate().address();
        let raw = signed_record(&keys, unix_now(), "bitcoincash:qq-misdirected");

        let demand = node.demand_for(&keys.address(), &raw).await;
        let (authorization, _) = node.settle(&demand).await;

        let response = node.put(&other, &raw, Some(&authorization)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(node.local_record(&other).await, None);

        let response = node.put(&keys.address(), &raw, Some(&authorization)).await;
        assert_eq!(response.status(), StatusCode::OK);
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_oversized_payload_is_rejected() {
        let cluster = Cluster::start(&[&[]]).await;
        let node = cluster.node(0);
        let keys = Secp256k1KeyPair::generate();
        let raw = signed_record(&keys, unix_now(), &"x".repeat(6_000));

        let response = node.put(&keys.address(), &raw, None).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_node_starts_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyserver.toml");
        let mut config = test_config(Vec::new());
        config.server.listen = "127.0.0.1:0".parse().unwrap();
        config.save(&path).unwrap();

        let loaded = NodeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        let mut runtime = NodeRuntime::new(KeyserverNode::new(loaded).unwrap());
        let addr = runtime.start().await.unwrap();
        assert!(runtime.node().devnet.is_some());

        let client = KeyserverClient::new(format!("http://{addr}"));
        let health = client.health().await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.peers, 0);

        runtime.shutdown().await;
    }
}
