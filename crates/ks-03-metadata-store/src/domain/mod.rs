//! Domain layer for the metadata store.

pub mod entities;
pub mod errors;
pub mod validation;

pub use entities::*;
pub use errors::StoreError;
pub use validation::{check_freshness, check_last_writer, decode_write, verify_signer, DecodedWrite};
