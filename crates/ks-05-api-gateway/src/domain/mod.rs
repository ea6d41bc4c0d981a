//! Domain layer for the HTTP façade: configuration, errors and responses.

pub mod config;
pub mod errors;
pub mod responses;

pub use config::GatewayConfig;
pub use errors::{ApiError, ErrorBody};
pub use responses::*;
