//! # PoP Keyserver Test Suite
//!
//! Cross-crate scenarios run against real nodes: every node is a full
//! `node-runtime` instance serving HTTP on a loopback port, and all nodes of
//! a cluster share one simulated chain so the test decides when blocks are
//! mined.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Cluster: N nodes, directed peer graph, shared devnet chain
//! ├── client.rs         # HTTP client speaking the keyserver protocol
//! └── integration/
//!     ├── write_flow.rs   # commit → pay → token → write → read on one node
//!     └── replication.rs  # confirmation-gated push, pull, forwarding, reorgs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ks-tests
//! cargo test -p ks-tests integration::replication
//! cargo bench -p ks-tests
//! ```

pub mod client;
pub mod harness;
pub mod integration;

pub use client::KeyserverClient;
pub use harness::{eventually, signed_record, unix_now, Cluster};
