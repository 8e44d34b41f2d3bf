//! Per-site request pipeline
//!
//! Every resolved site gets a fixed chain of handlers, outermost first:
//!
//! 1. [`DomainRedirect`] - send requests to the site's canonical domain
//! 2. [`Canonicalize`] - one URL per resource (slashes, `index.html`)
//! 3. [`SpaFallback`] - unknown paths fall back to the nearest existing parent
//! 4. [`IndexPage`] - directories are served through their `index.html`
//! 5. [`FileServer`] - conditional, cached, compressed file responses
//!
//! The chain is built once per resolution by [`build_pipeline`] and cached
//! next to the site.

mod body;
mod files;
mod range;
mod redirect;
mod spa;

pub use body::{Body, FileStream};
pub use files::FileServer;
pub use range::{parse_range_header, ByteRange, RangeHeader};
pub use redirect::{Canonicalize, DomainRedirect};
pub use spa::{IndexPage, SpaFallback};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION};
use http::{HeaderValue, Method, Response, StatusCode};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::cache::ContentCache;
use crate::compression::CompressionConfig;
use crate::resolver::Site;

/// Request as it flows through the pipeline. `path` is percent-decoded;
/// handlers may rewrite it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: Method,
    host: String,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    timestamp: u64,
}

impl RequestContext {
    /// Build from the method, host and raw request target (`/a%20b?x=1`).
    pub fn new(method: Method, host: &str, target: &str) -> Self {
        let (raw_path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        let path = urlencoding::decode(raw_path)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| raw_path.to_string());

        Self {
            request_id: Uuid::new_v4().to_string(),
            method,
            host: host.to_string(),
            path: if path.starts_with('/') {
                path
            } else {
                format!("/{}", path)
            },
            query,
            headers: HeaderMap::new(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Build from an `http` request; the host comes from the `Host` header,
    /// falling back to the URI authority.
    pub fn from_request<B>(request: &http::Request<B>) -> Self {
        let host = request
            .headers()
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| request.uri().authority().map(|a| a.as_str()))
            .unwrap_or("");
        let target = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        Self::new(request.method().clone(), host, target).with_headers(request.headers().clone())
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Host without port
    pub fn host(&self) -> &str {
        strip_port(&self.host)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Request timestamp (Unix epoch seconds)
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// `path` re-encoded for a `Location` header, with the query appended.
    pub fn location_for(&self, path: &str) -> String {
        let encoded = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        match &self.query {
            Some(query) => format!("{}?{}", encoded, query),
            None => encoded,
        }
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literals keep their colons
    if let Some(end) = host.find(']') {
        return &host[..=end];
    }
    host.split(':').next().unwrap_or(host)
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, req: RequestContext) -> Response<Body>;
}

/// Shared resources the file server needs
#[derive(Clone)]
pub struct PipelineContext {
    pub content_cache: Arc<ContentCache>,
    pub compression: Arc<CompressionConfig>,
}

impl PipelineContext {
    pub fn new(content_cache: Arc<ContentCache>, compression: Arc<CompressionConfig>) -> Self {
        Self {
            content_cache,
            compression,
        }
    }
}

/// Compose the handler chain for `site`.
pub fn build_pipeline(site: Arc<Site>, ctx: &PipelineContext) -> Arc<dyn Handler> {
    let fs = Arc::clone(&site.fs);

    let mut handler: Arc<dyn Handler> = Arc::new(FileServer::new(Arc::clone(&site), ctx.clone()));
    handler = Arc::new(IndexPage::new(Arc::clone(&fs), handler));
    if site.config.spa {
        handler = Arc::new(SpaFallback::new(Arc::clone(&fs), handler));
    }
    handler = Arc::new(Canonicalize::new(fs, handler));
    if let Some(domain) = &site.domain {
        handler = Arc::new(DomainRedirect::new(domain.clone(), handler));
    }
    handler
}

/// Plain-text response with the given status
pub fn text_response(status: StatusCode, body: &str) -> Response<Body> {
    let body = Body::Full(Bytes::copy_from_slice(body.as_bytes()));
    let mut response = Response::new(body);
    *response.status_mut() = status;
    let content_length = response.body().len();
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));
    response
}

/// `301 Moved Permanently` to `location`
pub fn redirect_response(location: &str) -> Response<Body> {
    let mut response = text_response(StatusCode::MOVED_PERMANENTLY, "Moved Permanently\n");
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}
