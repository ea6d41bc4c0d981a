//! # API Gateway Subsystem
//!
//! **Subsystem ID:** 5
//!
//! ## Purpose
//!
//! The HTTP surface of a keyserver node. Handlers parse requests, call one
//! subsystem port and map the answer to a status code. Every rule about
//! payments, tokens, records and replication lives behind those ports.
//!
//! ## Routes
//!
//! | Route | Success | Failures |
//! |-------|---------|----------|
//! | `POST /commit` | 402 demand, or 200 + token when already paid | 400, 413 |
//! | `POST /payments` | 200 ack + `Authorization: POP <token>` | 400, 402, 404, 503 |
//! | `PUT /keys/:address` | 200 write receipt | 400, 402, 403, 409, 413, 503 |
//! | `GET /keys/:address` | 200 raw `AuthWrapper` (`?digest=true`: SHA-256) | 400, 404 |
//! | `GET /peers` | 200 peer table | |
//! | `GET /metrics` | 200 Prometheus text | |
//! | `GET /health` | 200 | |
//!
//! A read miss falls through to a gossip pull unless the request carries
//! `Max-Forwards: 0`, which is what peers send when they pull.
//!
//! ## Middleware Stack
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ TraceLayer        request spans               │
//! │ TimeoutLayer      request_timeout             │
//! │ RequestBodyLimit  max_body_bytes              │
//! │ track_metrics     per-route count + latency   │
//! └──────────────────────┬────────────────────────┘
//!                        ▼
//!           handlers.rs → ks-01 / ks-02 / ks-03 / ks-04 ports
//! ```

pub mod domain;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use domain::*;
pub use router::{build_router, AppState};
pub use server::serve;
