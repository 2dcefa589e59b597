//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming conventions. Without an
//! installed recorder every call is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Spendboard metrics
pub const METRICS_PREFIX: &str = "spendboard";

/// Histogram buckets for request and query latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Documents processed by the ingestion engine, by outcome"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Per-document ingestion latency in seconds"
    );

    // Query metrics
    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Aggregation query latency in seconds"
    );

    describe_counter!(
        format!("{}_query_rows_total", METRICS_PREFIX),
        Unit::Count,
        "Rows returned by aggregation queries"
    );

    // Assistant metrics
    describe_counter!(
        format!("{}_assistant_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Chat-with-data questions, by outcome"
    );

    describe_histogram!(
        format!("{}_assistant_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Text-to-SQL round trip latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one ingested document
pub fn record_ingestion(duration_secs: f64, success: bool) {
    let outcome = if success { "success" } else { "failure" };

    counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Record one aggregation query
pub fn record_query(query: &'static str, duration_secs: f64, rows: usize) {
    histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        "query" => query
    )
    .record(duration_secs);

    counter!(
        format!("{}_query_rows_total", METRICS_PREFIX),
        "query" => query
    )
    .increment(rows as u64);
}

/// Record one chat-with-data question
pub fn record_assistant(duration_secs: f64, outcome: &'static str) {
    counter!(
        format!("{}_assistant_requests_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(format!("{}_assistant_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}
