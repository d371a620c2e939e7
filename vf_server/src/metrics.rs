//! Prometheus metrics for floor operations.
//!
//! Every API operation records one counter sample and one duration sample.
//! The exporter is only installed when `METRICS_BIND` is configured; without
//! it the `metrics` macros are no-ops.
//!
//! # Metrics
//!
//! - `floor_operations_total{operation,outcome}`: outcome is `ok` or the error code
//! - `floor_operation_duration_ms{operation}`
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use vf_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::floor_operation("waitlist.call_next", "ok", 3.2);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

/// Record one floor operation.
pub fn floor_operation(operation: &'static str, outcome: &str, duration_ms: f64) {
    metrics::counter!("floor_operations_total",
        "operation" => operation,
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!("floor_operation_duration_ms",
        "operation" => operation
    )
    .record(duration_ms);
}

/// Increment rejected session counter.
pub fn rejected_sessions_total() {
    metrics::counter!("rejected_sessions_total").increment(1);
}
