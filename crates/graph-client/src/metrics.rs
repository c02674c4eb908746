//! Request metrics
//!
//! Recorded through the `metrics` facade; the embedding binary decides
//! whether a recorder is installed. Without one these calls are no-ops.
//!
//! - `graph_requests_total` (counter): labels `method`, `status`
//! - `graph_request_duration_seconds` (histogram): label `method`
//! - `graph_pages_fetched_total` (counter)

/// Record a completed request. `status` is `"error"` when no response arrived.
pub fn record_request(method: &str, status: &str, duration_secs: f64) {
    metrics::counter!(
        "graph_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("graph_request_duration_seconds", "method" => method.to_string())
        .record(duration_secs);
}

/// Record one page fetched by the pagination walker.
pub fn record_page() {
    metrics::counter!("graph_pages_fetched_total").increment(1);
}
