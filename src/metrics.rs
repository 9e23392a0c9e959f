// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the metadata filter.
//!
//! All metrics carry the `kubemeta_` namespace prefix.
//!
//! # Metrics Categories
//!
//! - **Resolution Metrics** - Outcome of every tag resolution
//! - **Cache Metrics** - Lookups and rejected writes
//! - **API Server Metrics** - Request outcomes and latency
//!
//! # Example
//!
//! ```rust,no_run
//! use kubemeta::metrics::{gather_metrics, record_resolution};
//!
//! record_resolution("fetched");
//! println!("{}", gather_metrics().unwrap());
//! ```

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics
const METRICS_NAMESPACE: &str = "kubemeta";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Resolution Metrics
// ============================================================================

/// Total number of tag resolutions by outcome
///
/// Labels:
/// - `outcome`: `local`, `cached`, `fetched`, `uncached` or an error kind
pub static RESOLUTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resolutions_total"),
        "Total number of tag resolutions by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Cache Metrics
// ============================================================================

/// Total number of cache lookups
///
/// Labels:
/// - `result`: `hit` or `miss`
pub static CACHE_LOOKUPS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_cache_lookups_total"),
        "Total number of metadata cache lookups by result",
    );
    let counter = CounterVec::new(opts, &["result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of rejected cache writes
pub static CACHE_WRITE_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_cache_write_failures_total"),
        "Total number of metadata cache writes that were rejected",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// API Server Metrics
// ============================================================================

/// Total number of API server requests
///
/// Labels:
/// - `status`: HTTP status code, `connect_error` or `transport_error`
pub static API_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_api_requests_total"),
        "Total number of API server requests by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of API server requests in seconds
///
/// Labels:
/// - `status`: HTTP status code or `transport_error`
pub static API_REQUEST_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_api_request_duration_seconds"),
        "Duration of API server requests in seconds by status",
    )
    .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]);
    let histogram = HistogramVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record the outcome of a tag resolution
///
/// # Arguments
/// * `outcome` - How the metadata was produced, or which error ended the resolution
pub fn record_resolution(outcome: &str) {
    RESOLUTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a cache lookup
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    CACHE_LOOKUPS_TOTAL.with_label_values(&[result]).inc();
}

/// Record a rejected cache write
pub fn record_cache_write_failure() {
    CACHE_WRITE_FAILURES_TOTAL.inc();
}

/// Record an API server request
///
/// # Arguments
/// * `status` - HTTP status code, or the failure kind when no response arrived
/// * `duration` - Time spent waiting for the response, if a request was sent
pub fn record_api_request(status: &str, duration: Option<Duration>) {
    API_REQUESTS_TOTAL.with_label_values(&[status]).inc();
    if let Some(duration) = duration {
        API_REQUEST_DURATION_SECONDS
            .with_label_values(&[status])
            .observe(duration.as_secs_f64());
    }
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
