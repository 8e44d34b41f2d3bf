// Proxy module - Pingora ProxyHttp implementation
// The edge is the origin: every request is answered in request_filter and
// no upstream is ever contacted.

mod handler;
pub mod init;
pub mod logging;
pub mod special_endpoints;

pub use handler::{EdgeHandler, Served};

use async_trait::async_trait;
use http::header::HOST;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::pipeline::RequestContext;
use logging::{duration_to_ms, log_request_completion, RequestLogContext};

/// Per-request state carried from `request_filter` to `logging`
pub struct ProxyContext {
    start: Instant,
    request_id: String,
    method: String,
    host: String,
    path: String,
    identity: Option<String>,
    bytes_sent: u64,
}

impl ProxyContext {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            request_id: String::new(),
            method: String::new(),
            host: String::new(),
            path: String::new(),
            identity: None,
            bytes_sent: 0,
        }
    }
}

/// EdgeProxy implements the Pingora ProxyHttp trait on top of [`EdgeHandler`]
pub struct EdgeProxy {
    handler: Arc<EdgeHandler>,
}

impl EdgeProxy {
    pub fn new(handler: Arc<EdgeHandler>) -> Self {
        Self { handler }
    }

    fn request_context(session: &Session) -> RequestContext {
        let req = session.req_header();
        let host = req
            .headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| req.uri.host())
            .unwrap_or("");
        let target = req
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        RequestContext::new(req.method.clone(), host, target).with_headers(req.headers.clone())
    }
}

#[async_trait]
impl ProxyHttp for EdgeProxy {
    type CTX = ProxyContext;

    fn new_ctx(&self) -> Self::CTX {
        ProxyContext::new()
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        Err(pingora_core::Error::explain(
            pingora_core::ErrorType::InternalError,
            "edge responses never use an upstream",
        ))
    }

    /// Answer the request from the site pipeline
    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = Self::request_context(session);
        ctx.request_id = req.request_id().to_string();
        ctx.method = req.method().to_string();
        ctx.host = req.host().to_string();
        ctx.path = req.path().to_string();

        let served = self.handler.serve(req).await;
        ctx.identity = served.identity;

        let (parts, mut body) = served.response.into_parts();
        let mut header = ResponseHeader::build(parts.status.as_u16(), Some(parts.headers.len()))?;
        for (name, value) in parts.headers.iter() {
            header.append_header(name.clone(), value.clone())?;
        }
        header.insert_header("X-Request-Id", ctx.request_id.as_str())?;

        session
            .write_response_header(Box::new(header), body.is_empty())
            .await?;

        // Streamed bodies are written as they are read
        while !body.is_empty() {
            let chunk = match body.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        request_id = %ctx.request_id,
                        path = %ctx.path,
                        sent = ctx.bytes_sent,
                        error = %e,
                        "response body aborted"
                    );
                    return Err(pingora_core::Error::because(
                        pingora_core::ErrorType::ReadError,
                        "reading response body",
                        e,
                    ));
                }
            };
            ctx.bytes_sent += chunk.len() as u64;
            session
                .write_response_body(Some(chunk), body.is_empty())
                .await?;
        }

        Ok(true) // Request handled
    }

    async fn logging(
        &self,
        session: &mut Session,
        _e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status_code = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);

        log_request_completion(&RequestLogContext {
            request_id: ctx.request_id.clone(),
            method: ctx.method.clone(),
            host: ctx.host.clone(),
            path: ctx.path.clone(),
            identity: ctx.identity.take(),
            status_code,
            duration_ms: duration_to_ms(ctx.start.elapsed()),
            bytes_sent: ctx.bytes_sent,
        });
    }
}
