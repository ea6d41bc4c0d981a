//! Domain layer for gossip.

pub mod entities;
pub mod errors;
pub mod peers;
pub mod verify;

pub use entities::*;
pub use errors::{GossipError, TransportError};
pub use peers::{select_peers, PeerTable};
pub use verify::verify_peer_record;
