//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_admissions_total` (counter): admission attempts by outcome
//! - `balancer_releases_total` (counter): targets returned to the pool
//! - `balancer_dispatch_duration_seconds` (histogram): wait + forward latency by outcome
//! - `balancer_targets`, `balancer_busy_targets`, `balancer_waiting` (gauges)
//! - `balancer_discovery_refresh_total` (counter): refresh attempts by result
//! - `balancer_discovered_targets` (gauge): size of the last successful refresh
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admission(outcome: &'static str) {
    counter!("balancer_admissions_total", "outcome" => outcome).increment(1);
}

pub fn record_release() {
    counter!("balancer_releases_total").increment(1);
}

pub fn record_dispatch(outcome: &'static str, start: Instant) {
    histogram!("balancer_dispatch_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_pool_state(targets: usize, busy: usize, waiting: usize) {
    gauge!("balancer_targets").set(targets as f64);
    gauge!("balancer_busy_targets").set(busy as f64);
    gauge!("balancer_waiting").set(waiting as f64);
}

pub fn record_refresh(result: &'static str, targets: usize) {
    counter!("balancer_discovery_refresh_total", "result" => result).increment(1);
    if result == "ok" {
        gauge!("balancer_discovered_targets").set(targets as f64);
    }
}
