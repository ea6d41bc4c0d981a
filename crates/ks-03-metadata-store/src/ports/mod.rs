//! Ports for the metadata store.

pub mod inbound;
pub mod outbound;

pub use inbound::MetadataStoreApi;
pub use outbound::{PaymentGate, RecordBackend};
