//! # Background Tasks
//!
//! Long-running tasks the runtime spawns beside the HTTP server. Each one
//! stops when the shutdown channel flips to `true`.

pub mod event_log;
pub mod maintenance;
pub mod miner;

pub use event_log::EventLogger;
pub use maintenance::Maintenance;
pub use miner::DevnetMiner;
