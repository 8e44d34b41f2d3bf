//! Special endpoint handlers for the admin host.
//!
//! - `/health` - liveness with uptime, version and cache occupancy
//! - `/metrics` - Prometheus metrics export
//!
//! Functions return `EndpointResponse` instead of an `http::Response` so the
//! generators stay trivially testable.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Response, StatusCode};
use std::time::Instant;

use crate::metrics::export_prometheus;
use crate::pipeline::Body;

/// Response from a special endpoint handler.
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value
    pub content_type: &'static str,
    /// Response body
    pub body: String,
}

impl EndpointResponse {
    /// Create a JSON response with the given status and body.
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    /// Create a plain text response (for Prometheus metrics).
    pub fn prometheus(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; version=0.0.4",
            body,
        }
    }

    pub fn into_response(self) -> Response<Body> {
        let body = Bytes::from(self.body);
        let length = body.len();
        let mut response = Response::new(Body::Full(body));
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        response
    }
}

/// Generate response for /health endpoint.
pub fn handle_health(start_time: Instant, cached_sites: u64) -> EndpointResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "cached_sites": cached_sites,
    })
    .to_string();

    EndpointResponse::json(200, body)
}

/// Generate response for /metrics endpoint.
pub fn handle_metrics() -> EndpointResponse {
    EndpointResponse::prometheus(export_prometheus())
}

/// 404 for unknown admin paths
pub fn handle_unknown(path: &str) -> EndpointResponse {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
        "status": 404
    })
    .to_string();
    EndpointResponse::json(404, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;

    #[test]
    fn test_health_body() {
        let response = handle_health(Instant::now(), 3);
        assert_eq!(response.status, 200);
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["cached_sites"], 3);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_metrics_export() {
        Metrics::global().record_resolution("hit");
        let response = handle_metrics();
        assert_eq!(response.content_type, "text/plain; version=0.0.4");
        assert!(response.body.contains("siteedge_"));
    }

    #[test]
    fn test_into_response() {
        let response = handle_unknown("/nope").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }
}
