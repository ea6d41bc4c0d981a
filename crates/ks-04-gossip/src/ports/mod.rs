//! Ports for the gossip engine.

pub mod inbound;
pub mod outbound;

pub use inbound::GossipApi;
pub use outbound::{LocalStore, PeerTransport};
