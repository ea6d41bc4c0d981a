//! # Gossip Subsystem
//!
//! **Subsystem ID:** 4
//!
//! ## Purpose
//!
//! Replicates accepted records between keyservers. Pushes wait for the
//! paying transaction to reach the confirmation threshold; pulls fill local
//! read misses on demand. Gossip is best-effort, not consensus: every node
//! applies its own last-writer-wins rule to whatever arrives.
//!
//! ## Replication Rules
//!
//! | Path | Trigger | Authorization at the receiver |
//! |------|---------|-------------------------------|
//! | Push | `PropagationReady` event | `POP-TX <txid>` chain proof |
//! | Pull | local read miss | none; the record is self-certifying |
//!
//! - Pushed records are forwarded again by the receiver, so they travel the
//!   directed peer graph; LWW conflicts stop the flood.
//! - Pull requests carry `Max-Forwards: 0` so a peer answers from its own
//!   store only.
//! - The peer set is static configuration. There is no discovery.
//!
//! ## Module Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  relay.rs    - GossipRelay (events → pushes, shutdown)          │
//! │  service.rs  - GossipEngine (push tasks, concurrent pulls)      │
//! └─────────────────────────────────────────────────────────────────┘
//!        ↓ ports/outbound.rs: PeerTransport, LocalStore ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/http.rs  - HttpTransport (reqwest)                    │
//! │  node-runtime      - LocalStore over the ks-03 store            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod relay;
pub mod service;

pub use adapters::HttpTransport;
pub use domain::*;
pub use ports::{GossipApi, LocalStore, PeerTransport};
pub use relay::GossipRelay;
pub use service::GossipEngine;
