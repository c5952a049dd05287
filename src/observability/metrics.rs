//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_csrf_issued_total` (counter): tokens issued, by strategy
//! - `guard_csrf_rejected_total` (counter): rejected requests, by code
//! - `guard_rate_limited_total` (counter): 429s, by route
//! - `guard_store_errors_total` (counter): failed store calls, by operation
//! - `guard_rate_limit_windows` (gauge): live rate limit windows after a sweep
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; a no-op until an exporter is installed
//! - Prometheus exporter only when `observability.metrics_enabled`

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint. Must run inside the tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_csrf_issued(strategy: &'static str) {
    metrics::counter!("guard_csrf_issued_total", "strategy" => strategy).increment(1);
}

pub fn record_csrf_rejected(code: &'static str) {
    metrics::counter!("guard_csrf_rejected_total", "code" => code).increment(1);
}

pub fn record_rate_limited(route: &str) {
    metrics::counter!("guard_rate_limited_total", "route" => route.to_string()).increment(1);
}

pub fn record_store_error(op: &'static str) {
    metrics::counter!("guard_store_errors_total", "op" => op).increment(1);
}

pub fn record_window_count(count: usize) {
    metrics::gauge!("guard_rate_limit_windows").set(count as f64);
}
