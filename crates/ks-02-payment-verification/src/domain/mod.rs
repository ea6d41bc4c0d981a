//! Domain layer for payment verification.

pub mod entities;
pub mod errors;
pub mod matching;

pub use entities::*;
pub use errors::{ChainProofError, OracleError, PaymentError};
pub use matching::{check_chain_proof, match_payment, Mismatch};
