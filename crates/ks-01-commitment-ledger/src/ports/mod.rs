//! Ports for the commitment ledger.

pub mod inbound;

pub use inbound::{CommitResponse, CommitmentLedgerApi};
