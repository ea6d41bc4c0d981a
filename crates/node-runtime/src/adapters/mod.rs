//! Adapters joining the subsystems' outbound ports to each other.

pub mod gate;
pub mod gossip_store;
pub mod oracle;
pub mod storage;

pub use gate::LedgerGate;
pub use gossip_store::StoreBridge;
pub use oracle::NodeOracle;
pub use storage::NodeBackend;
