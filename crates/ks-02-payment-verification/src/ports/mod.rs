//! Ports for the payment verifier.

pub mod inbound;
pub mod outbound;

pub use inbound::PaymentVerificationApi;
pub use outbound::LedgerOracle;
