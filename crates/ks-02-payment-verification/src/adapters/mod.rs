//! Ledger oracle adapters.

pub mod json_rpc;
pub mod memory;

pub use json_rpc::{JsonRpcConfig, JsonRpcOracle};
pub use memory::{InMemoryLedger, SimulatedOutput, SimulatedTransaction};
