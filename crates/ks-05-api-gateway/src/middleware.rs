//! Prometheus request metrics.
//!
//! Installed with `route_layer` so the matched route template (not the raw
//! path with its address) is the label.

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use ks_telemetry::metrics::{HTTP_REQUESTS, HTTP_REQUEST_DURATION};

pub async fn track_metrics(request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_owned();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_owned(), |p| p.as_str().to_owned());

    let timer = HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &route])
        .start_timer();
    let response = next.run(request).await;
    timer.observe_duration();

    HTTP_REQUESTS
        .with_label_values(&[&method, &route, response.status().as_str()])
        .inc();
    response
}
