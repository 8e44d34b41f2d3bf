//! Per-request completion logging and metrics.
//!
//! Functions here build plain data describing what to log and record, so
//! the decisions stay testable without a pingora session.

use std::time::Duration;

use crate::metrics::Metrics;

/// Request logging context for structured logging.
#[derive(Debug, Clone)]
pub struct RequestLogContext {
    /// Request ID for tracing.
    pub request_id: String,
    /// HTTP method.
    pub method: String,
    /// Request host (without port).
    pub host: String,
    /// Request path.
    pub path: String,
    /// Site identity, when the host matched the pattern.
    pub identity: Option<String>,
    /// HTTP status code.
    pub status_code: u16,
    /// Duration in milliseconds.
    pub duration_ms: f64,
    /// Response body bytes.
    pub bytes_sent: u64,
}

/// Calculate request duration from a Duration.
pub fn duration_to_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Log level bucket for a status code: server errors are warnings, the
/// rest is routine.
pub fn is_server_error(status_code: u16) -> bool {
    status_code >= 500
}

/// Emit the completion line and update request metrics.
pub fn log_request_completion(ctx: &RequestLogContext) {
    Metrics::global().record_request(
        ctx.status_code,
        &ctx.method,
        ctx.duration_ms / 1000.0,
        ctx.bytes_sent,
    );

    let identity = ctx.identity.as_deref().unwrap_or("-");
    if is_server_error(ctx.status_code) {
        tracing::warn!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            host = %ctx.host,
            identity = %identity,
            path = %ctx.path,
            status = ctx.status_code,
            duration_ms = ctx.duration_ms,
            bytes = ctx.bytes_sent,
            "request completed"
        );
    } else {
        tracing::info!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            host = %ctx.host,
            identity = %identity,
            path = %ctx.path,
            status = ctx.status_code,
            duration_ms = ctx.duration_ms,
            bytes = ctx.bytes_sent,
            "request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_to_ms() {
        assert_eq!(duration_to_ms(Duration::from_millis(250)), 250.0);
        assert_eq!(duration_to_ms(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_server_error_classification() {
        assert!(!is_server_error(200));
        assert!(!is_server_error(404));
        assert!(is_server_error(500));
        assert!(is_server_error(503));
    }

    #[test]
    fn test_completion_records_metrics() {
        let ctx = RequestLogContext {
            request_id: "r-1".to_string(),
            method: "GET".to_string(),
            host: "acme.localhost".to_string(),
            path: "/".to_string(),
            identity: Some("acme".to_string()),
            status_code: 418,
            duration_ms: 1.5,
            bytes_sent: 10,
        };
        let before = Metrics::global()
            .requests
            .with_label_values(&["418", "GET"])
            .get();
        log_request_completion(&ctx);
        let after = Metrics::global()
            .requests
            .with_label_values(&["418", "GET"])
            .get();
        assert_eq!(after, before + 1);
    }
}
