// Prometheus metrics for the edge
//
// - Requests by status and method, request duration
// - Site resolutions by outcome (hit, load, error kind)
// - Content cache operations (hit, miss, set) and served bytes

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Global metrics registry
pub struct Metrics {
    /// Responses by status code and method
    pub requests: IntCounterVec,

    /// Request duration histogram (in seconds)
    pub request_duration: Histogram,

    /// Site resolution outcomes: `hit`, `load`, or an error kind
    pub resolutions: IntCounterVec,

    /// Content cache operations: `hit`, `miss`, `set`
    pub content_cache: IntCounterVec,

    /// Response body bytes written
    pub bytes_served: IntCounter,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    /// Initialize and return the global metrics instance
    pub fn global() -> &'static Self {
        METRICS.get_or_init(|| {
            let requests = register_int_counter_vec!(
                "siteedge_requests_total",
                "HTTP responses by status code and method",
                &["status", "method"]
            )
            .expect("Failed to register requests_total metric");

            let request_duration = register_histogram!(
                "siteedge_request_duration_seconds",
                "Time from request header to response completion in seconds",
                vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0] // 0.5ms to 5s
            )
            .expect("Failed to register request_duration_seconds metric");

            let resolutions = register_int_counter_vec!(
                "siteedge_site_resolutions_total",
                "Site resolutions by outcome",
                &["outcome"]
            )
            .expect("Failed to register site_resolutions_total metric");

            let content_cache = register_int_counter_vec!(
                "siteedge_content_cache_operations_total",
                "Content cache operations by type",
                &["operation"] // hit, miss, set
            )
            .expect("Failed to register content_cache_operations_total metric");

            let bytes_served = register_int_counter!(
                "siteedge_bytes_served_total",
                "Response body bytes written to clients"
            )
            .expect("Failed to register bytes_served_total metric");

            Metrics {
                requests,
                request_duration,
                resolutions,
                content_cache,
                bytes_served,
            }
        })
    }

    pub fn record_request(&self, status: u16, method: &str, duration_secs: f64, body_bytes: u64) {
        self.requests
            .with_label_values(&[&status.to_string(), method])
            .inc();
        self.request_duration.observe(duration_secs);
        self.bytes_served.inc_by(body_bytes);
    }

    pub fn record_resolution(&self, outcome: &str) {
        self.resolutions.with_label_values(&[outcome]).inc();
    }

    pub fn record_content_cache(&self, operation: &str) {
        self.content_cache.with_label_values(&[operation]).inc();
    }
}

/// Render every registered metric in the Prometheus text format
pub fn export_prometheus() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
