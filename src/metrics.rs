//! Prometheus metrics for the serving path.
//!
//! This module provides:
//! - Inference latency
//! - HTTP handler latency per endpoint
//! - Prediction create/update counters
//! - Validation failure counters
//!
//! Not to be confused with [`crate::evaluation`], which holds the model's
//! offline quality metrics.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

// === Metric Name Constants ===

/// Inference latency metric name.
pub const METRIC_INFERENCE_LATENCY: &str = "inference_latency_ms";
/// HTTP handler latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";
/// Predictions created counter metric name.
pub const METRIC_PREDICTIONS_CREATED: &str = "predictions_created_total";
/// Predictions updated counter metric name.
pub const METRIC_PREDICTIONS_UPDATED: &str = "predictions_updated_total";
/// Validation failures counter metric name.
pub const METRIC_VALIDATION_FAILURES: &str = "validation_failures_total";

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    init_metrics();
    Ok(handle)
}

/// Register metric descriptions.
/// Call once at startup after a recorder is installed.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_INFERENCE_LATENCY,
        "Model inference latency in milliseconds"
    );
    describe_histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "HTTP handler latency in milliseconds"
    );

    describe_counter!(
        METRIC_PREDICTIONS_CREATED,
        "Total number of predictions recorded"
    );
    describe_counter!(
        METRIC_PREDICTIONS_UPDATED,
        "Total number of predictions re-scored after an update"
    );
    describe_counter!(
        METRIC_VALIDATION_FAILURES,
        "Total number of rejected request bodies"
    );

    debug!("Metrics initialized");
}

/// Record HTTP handler latency.
pub fn record_http_latency(start: Instant, endpoint: &'static str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_HTTP_REQUEST_LATENCY, "endpoint" => endpoint).record(latency_ms);
}

/// Increment predictions created counter.
pub fn inc_predictions_created() {
    counter!(METRIC_PREDICTIONS_CREATED).increment(1);
}

/// Increment predictions updated counter.
pub fn inc_predictions_updated() {
    counter!(METRIC_PREDICTIONS_UPDATED).increment(1);
}

/// Increment validation failures counter.
pub fn inc_validation_failures(endpoint: &'static str) {
    counter!(METRIC_VALIDATION_FAILURES, "endpoint" => endpoint).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for model inference.
pub fn timer_inference() -> LatencyTimer {
    LatencyTimer::new(METRIC_INFERENCE_LATENCY)
}
