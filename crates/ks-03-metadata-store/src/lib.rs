//! # Metadata Store Subsystem
//!
//! **Subsystem ID:** 3
//!
//! ## Purpose
//!
//! Holds the single authoritative signed metadata record per address. Every
//! write, whether uploaded by a client, pushed by a peer or pulled after a
//! read miss, passes the same validation pipeline; only the authorization
//! step differs.
//!
//! ## Write Authorization
//!
//! | Source | Credential | Check |
//! |--------|------------|-------|
//! | Client | none | implicit commit, answered with a payment demand |
//! | Client | `POP <token>` | token bound to `(pubkey digest, payload digest)`, consumed on success |
//! | Peer push | `POP-TX <txid>` | paying transaction confirmed and sufficient |
//! | Pull | none | signature, freshness and LWW only |
//!
//! ## Invariants
//!
//! - A stored record always verifies against its address.
//! - A replacement carries a strictly newer timestamp, unless the stored
//!   record already expired.
//! - A token is consumed only by a write that is actually stored.
//! - Expired records are never served.
//!
//! ## Module Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service.rs  - MetadataStore (per-address locks, events)        │
//! │  domain/     - StoredRecord, StoreError, validation pipeline    │
//! └─────────────────────────────────────────────────────────────────┘
//!        ↓ ports/outbound.rs: RecordBackend, PaymentGate ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/memory.rs  - MemoryBackend                            │
//! │  node-runtime        - RocksDB backend, gate over ks-01/ks-02   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::MemoryBackend;
pub use domain::*;
pub use ports::{MetadataStoreApi, PaymentGate, RecordBackend};
pub use service::MetadataStore;
