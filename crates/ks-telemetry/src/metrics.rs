//! Prometheus metrics for the keyserver.
//!
//! All metrics follow the naming convention: `ks_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: monotonically increasing value (e.g. `ks_payments_total`)
//! - **Gauge**: value that can go up or down (e.g. `ks_store_records`)
//! - **Histogram**: distribution of values (e.g. request latency)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts,
    HistogramVec, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // HTTP SURFACE
    // =========================================================================

    /// Requests by method, route template and status code
    pub static ref HTTP_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("ks_http_requests_total", "Total HTTP requests handled"),
        &["method", "route", "status"]
    ).expect("metric creation failed");

    /// Request latency by method and route template
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "ks_http_request_duration_seconds",
            "HTTP request latency"
        ).buckets(exponential_buckets(0.0005, 2.0, 14).expect("valid buckets")),
        &["method", "route"]
    ).expect("metric creation failed");

    // =========================================================================
    // COMMITMENT LEDGER
    // =========================================================================

    /// Commitments created (explicit or implicit)
    pub static ref COMMITMENTS_OPENED: Counter = Counter::new(
        "ks_ledger_commitments_opened_total",
        "Total commitments opened"
    ).expect("metric creation failed");

    /// Tokens consumed by accepted writes
    pub static ref TOKENS_REDEEMED: Counter = Counter::new(
        "ks_ledger_tokens_redeemed_total",
        "Total tokens redeemed by writes"
    ).expect("metric creation failed");

    /// Commitments, tokens and pending pushes dropped by expiry
    pub static ref LEDGER_EXPIRED: CounterVec = CounterVec::new(
        Opts::new("ks_ledger_expired_total", "Ledger entries removed by expiry"),
        &["kind"]  // kind: commitment/token/pending_push
    ).expect("metric creation failed");

    // =========================================================================
    // PAYMENT VERIFICATION
    // =========================================================================

    /// Payment submissions by outcome
    pub static ref PAYMENTS: CounterVec = CounterVec::new(
        Opts::new("ks_payments_total", "Payment submissions"),
        &["outcome"]  // outcome: accepted/insufficient/wrong_digest/not_observed/oracle_error
    ).expect("metric creation failed");

    /// Payments that reached the confirmation threshold
    pub static ref PAYMENTS_CONFIRMED: Counter = Counter::new(
        "ks_payments_confirmed_total",
        "Payments that reached the confirmation threshold"
    ).expect("metric creation failed");

    /// Payments that disappeared from the ledger after being observed
    pub static ref PAYMENTS_REORGED: Counter = Counter::new(
        "ks_payments_reorged_total",
        "Observed payments later reported missing by the oracle"
    ).expect("metric creation failed");

    /// Failed ledger oracle calls (after timeout or transport error)
    pub static ref ORACLE_ERRORS: CounterVec = CounterVec::new(
        Opts::new("ks_oracle_errors_total", "Ledger oracle call failures"),
        &["call"]
    ).expect("metric creation failed");

    // =========================================================================
    // METADATA STORE
    // =========================================================================

    /// Accepted writes by source
    pub static ref RECORDS_STORED: CounterVec = CounterVec::new(
        Opts::new("ks_store_records_stored_total", "Accepted record writes"),
        &["source"]  // source: client/push/pull
    ).expect("metric creation failed");

    /// Rejected writes by reason
    pub static ref WRITES_REJECTED: CounterVec = CounterVec::new(
        Opts::new("ks_store_writes_rejected_total", "Rejected record writes"),
        &["reason"]
    ).expect("metric creation failed");

    /// Records dropped because their TTL elapsed
    pub static ref RECORDS_EXPIRED: Counter = Counter::new(
        "ks_store_records_expired_total",
        "Records removed after TTL expiry"
    ).expect("metric creation failed");

    /// Records currently held
    pub static ref STORE_RECORDS: Gauge = Gauge::new(
        "ks_store_records",
        "Number of records currently stored"
    ).expect("metric creation failed");

    // =========================================================================
    // GOSSIP
    // =========================================================================

    /// Push attempts by final outcome
    pub static ref GOSSIP_PUSHES: CounterVec = CounterVec::new(
        Opts::new("ks_gossip_pushes_total", "Record pushes to peers"),
        &["outcome"]  // outcome: accepted/conflict/rejected/failed/skipped
    ).expect("metric creation failed");

    /// Pull lookups by outcome
    pub static ref GOSSIP_PULLS: CounterVec = CounterVec::new(
        Opts::new("ks_gossip_pulls_total", "Record pulls from peers"),
        &["outcome"]  // outcome: found/not_found/invalid
    ).expect("metric creation failed");

    /// Peer call latency
    pub static ref PEER_CALL_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ks_gossip_peer_call_duration_seconds",
            "Latency of calls to peers"
        ).buckets(exponential_buckets(0.001, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // HTTP
        Box::new(HTTP_REQUESTS.clone()),
        Box::new(HTTP_REQUEST_DURATION.clone()),
        // Ledger
        Box::new(COMMITMENTS_OPENED.clone()),
        Box::new(TOKENS_REDEEMED.clone()),
        Box::new(LEDGER_EXPIRED.clone()),
        // Payments
        Box::new(PAYMENTS.clone()),
        Box::new(PAYMENTS_CONFIRMED.clone()),
        Box::new(PAYMENTS_REORGED.clone()),
        Box::new(ORACLE_ERRORS.clone()),
        // Store
        Box::new(RECORDS_STORED.clone()),
        Box::new(WRITES_REJECTED.clone()),
        Box::new(RECORDS_EXPIRED.clone()),
        Box::new(STORE_RECORDS.clone()),
        // Gossip
        Box::new(GOSSIP_PUSHES.clone()),
        Box::new(GOSSIP_PULLS.clone()),
        Box::new(PEER_CALL_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
