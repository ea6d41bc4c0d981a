//! # Shared Types Crate
//!
//! Domain entities and wire messages for the proof-of-payment keyserver.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: records, commitment keys and payment messages
//!   are defined once here and used by every subsystem.
//! - **Self-certifying records**: an [`AuthWrapper`] carries the signer's key,
//!   the exact payload bytes and the signature, so any node can re-verify it.
//! - **Tagged messages**: every protocol message with more than one shape is
//!   an enum, never a struct with optional success/error fields.
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | `entities` | `Address`, `Digest`, `AddressMetadata`, `AuthWrapper`, `CommitmentKey`, `TxId`, `PeerRecord` |
//! | `messages` | `PaymentRequest`, `Payment`, `PaymentAck`, `CommitRequest`, `Credential` |
//! | `time` | `TimeSource` abstraction |
//! | `backoff` | bounded exponential retry schedule |

pub mod backoff;
pub mod entities;
pub mod errors;
pub mod messages;
pub mod time;

pub use backoff::BackoffPolicy;
pub use entities::*;
pub use errors::DecodeError;
pub use messages::*;
pub use time::{MockTimeSource, SystemTimeSource, TimeSource};

/// Upper bound on any bincode-decoded structure.
pub const MAX_DECODE_BYTES: u64 = 1024 * 1024;
