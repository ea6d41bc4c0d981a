//! # Payment Verification Subsystem
//!
//! **Subsystem ID:** 2
//!
//! ## Purpose
//!
//! Decides whether a ledger transaction satisfies an open commitment and
//! tracks how deep it is buried. Depth changes drive the commitment ledger:
//! confirmations release pending pushes, disappearances revert payments.
//!
//! ## Responsibilities
//!
//! | Operation | Entry point | Failure surface |
//! |-----------|-------------|-----------------|
//! | Payment submission | `PaymentVerificationApi::process_payment` | `PaymentError` (402 / 400 / 404 / 503) |
//! | Peer chain proof | `PaymentVerificationApi::verify_chain_proof` | `ChainProofError` |
//! | Depth polling | `PaymentVerifier::poll_once` | logged, retried next cycle |
//! | Out-of-band payments | `poll_once` with `scan_out_of_band` | logged |
//!
//! ## Reorg Policy
//!
//! A payment the oracle stops reporting reverts its commitment to `OPEN`,
//! revokes the unredeemed token and cancels any push still waiting for depth.
//! Records that were already pushed to peers are never retracted; the
//! confirmation depth is the knob that bounds that risk.
//!
//! ## Module Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  watcher.rs   - ConfirmationWatcher (select! on blocks/interval)│
//! │  service.rs   - PaymentVerifier (timeouts, retry, events)       │
//! └─────────────────────────────────────────────────────────────────┘
//!              ↓ ports/outbound.rs: LedgerOracle ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/memory.rs    - InMemoryLedger (tests, devnet)         │
//! │  adapters/json_rpc.rs  - JsonRpcOracle (Bitcoin-Core-style RPC) │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod watcher;

pub use adapters::{InMemoryLedger, JsonRpcConfig, JsonRpcOracle, SimulatedTransaction};
pub use domain::*;
pub use ports::{LedgerOracle, PaymentVerificationApi};
pub use service::PaymentVerifier;
pub use watcher::ConfirmationWatcher;
