//! Gateway configuration.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Largest request body accepted by any route.
    pub max_body_bytes: usize,
    /// Largest `payload_size` an explicit commit may price.
    pub max_payload_size: usize,
    /// Whole-request deadline.
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 64 * 1024,
            max_payload_size: 5 * 1024,
            request_timeout: Duration::from_secs(30),
        }
    }
}
