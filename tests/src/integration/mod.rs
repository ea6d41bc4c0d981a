//! Cross-subsystem scenarios over HTTP.

pub mod replication;
pub mod write_flow;
