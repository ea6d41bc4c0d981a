//! Domain layer for the commitment ledger.
//!
//! Pure logic only: every operation takes `now` explicitly and performs no
//! I/O, so the state machine can be tested without clocks or runtimes.

pub mod entities;
pub mod errors;
pub mod fees;
pub mod ledger;
pub mod token;

pub use entities::*;
pub use errors::{LedgerError, TokenRejection};
pub use fees::FeeSchedule;
pub use ledger::CommitmentLedger;
pub use token::{Token, TokenId, TokenIssuer};
