//! # Commitment Ledger Subsystem
//!
//! **Subsystem ID:** 1
//!
//! ## Purpose
//!
//! Gates every client write behind a payment. A commitment binds an identity
//! (`pubkey_digest`) and a payload (`metadata_digest`) to a payment demand;
//! once the payment is observed a single-use bearer token is minted, and the
//! token is consumed by exactly one accepted write.
//!
//! ## State Machine
//!
//! ```text
//! [OPEN] ──paid──→ [PAID_UNCONFIRMED] ──depth ≥ D──→ [CONFIRMED]
//!                          │                              │
//!                          └────────── redeem ────────────┴──→ [REDEEMED]
//! ```
//!
//! | Transition | Method | Effect |
//! |------------|--------|--------|
//! | open | `commit()` | create or return the existing demand |
//! | pay | `record_payment()` | mint token |
//! | confirm | `apply_depth()` | depth reached; release pending pushes |
//! | redeem | `redeem()` | consume token, close commitment |
//! | reorg | `apply_depth(.., None)` | revert to OPEN, revoke token, cancel pushes |
//! | expire | lazily on access, `sweep()` | drop OPEN past window, tokens past TTL |
//!
//! Local write acceptance happens on redemption regardless of depth; only
//! propagation to peers waits for depth `D`.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service.rs        - LedgerService (Mutex + clock + metrics)    │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/inbound.rs  - CommitmentLedgerApi                        │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/ledger.rs    - CommitmentLedger state machine           │
//! │  domain/token.rs     - TokenIssuer (HMAC-bound tokens)          │
//! │  domain/fees.rs      - FeeSchedule                              │
//! │  domain/entities.rs  - Commitment, transitions, config          │
//! │  domain/errors.rs    - LedgerError, TokenRejection              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::*;
pub use service::LedgerService;
