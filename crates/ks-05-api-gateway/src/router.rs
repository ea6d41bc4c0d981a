//! Route table and shared state.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /commit` | [`handlers::commit`] |
//! | `PUT /keys/:address` | [`handlers::put_record`] |
//! | `GET /keys/:address` | [`handlers::get_record`] |
//! | `POST /payments` | [`handlers::submit_payment`] |
//! | `GET /peers` | [`handlers::peers`] |
//! | `GET /metrics` | [`handlers::metrics`] |
//! | `GET /health` | [`handlers::health`] |

use crate::domain::GatewayConfig;
use crate::handlers;
use crate::middleware::track_metrics;
use axum::routing::{get, post};
use axum::Router;
use ks_01_commitment_ledger::CommitmentLedgerApi;
use ks_02_payment_verification::PaymentVerificationApi;
use ks_03_metadata_store::MetadataStoreApi;
use ks_04_gossip::GossipApi;
use shared_types::PAYMENT_URL;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn CommitmentLedgerApi>,
    pub payments: Arc<dyn PaymentVerificationApi>,
    pub store: Arc<dyn MetadataStoreApi>,
    pub gossip: Arc<dyn GossipApi>,
    pub config: GatewayConfig,
}

pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    Router::new()
        .route("/commit", post(handlers::commit))
        .route(
            "/keys/:address",
            get(handlers::get_record).put(handlers::put_record),
        )
        .route(PAYMENT_URL, post(handlers::submit_payment))
        .route("/peers", get(handlers::peers))
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health))
        .route_layer(axum::middleware::from_fn(track_metrics))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
