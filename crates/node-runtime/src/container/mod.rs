//! Configuration and the subsystem container.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, NodeConfig, OracleMode};
pub use subsystems::{KeyserverNode, NodeError, NodeGate, NodeGossip, NodeStore, NodeVerifier};
