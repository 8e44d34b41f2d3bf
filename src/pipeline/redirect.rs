use async_trait::async_trait;
use http::Response;
use std::sync::Arc;
use tracing::debug;

use super::{redirect_response, Body, Handler, RequestContext};
use crate::constants::INDEX_PAGE;
use crate::vfs::{clean_path, FileSystem};

/// Redirects requests for any other host to the site's canonical domain.
pub struct DomainRedirect {
    domain: String,
    next: Arc<dyn Handler>,
}

impl DomainRedirect {
    pub fn new(domain: String, next: Arc<dyn Handler>) -> Self {
        Self { domain, next }
    }
}

#[async_trait]
impl Handler for DomainRedirect {
    async fn handle(&self, req: RequestContext) -> Response<Body> {
        if req.host().eq_ignore_ascii_case(&self.domain) {
            return self.next.handle(req).await;
        }

        let scheme = req.header("x-forwarded-proto").unwrap_or("https");
        let location = format!(
            "{}://{}{}",
            scheme,
            self.domain,
            req.location_for(req.path())
        );
        debug!(
            request_id = %req.request_id(),
            from = %req.host(),
            to = %self.domain,
            "redirecting to canonical domain"
        );
        redirect_response(&location)
    }
}

/// Redirects to the one canonical URL of a resource: clean path, directories
/// with a trailing slash, files without, `…/index.html` as `…/`.
pub struct Canonicalize {
    fs: Arc<dyn FileSystem>,
    next: Arc<dyn Handler>,
}

impl Canonicalize {
    pub fn new(fs: Arc<dyn FileSystem>, next: Arc<dyn Handler>) -> Self {
        Self { fs, next }
    }

    async fn canonical_path(&self, requested: &str) -> String {
        let cleaned = clean_path(requested);

        if let Some(dir) = cleaned.strip_suffix(INDEX_PAGE) {
            if dir.ends_with('/') {
                return dir.to_string();
            }
        }
        if cleaned == "/" {
            return cleaned;
        }

        match self.fs.stat(&cleaned).await {
            Ok(info) if info.is_dir => format!("{}/", cleaned),
            Ok(_) => cleaned,
            // Unknown paths keep the caller's trailing slash
            Err(_) if requested.ends_with('/') => format!("{}/", cleaned),
            Err(_) => cleaned,
        }
    }
}

#[async_trait]
impl Handler for Canonicalize {
    async fn handle(&self, req: RequestContext) -> Response<Body> {
        let canonical = self.canonical_path(req.path()).await;
        if canonical == req.path() {
            return self.next.handle(req).await;
        }

        debug!(
            request_id = %req.request_id(),
            path = %req.path(),
            canonical = %canonical,
            "redirecting to canonical path"
        );
        redirect_response(&req.location_for(&canonical))
    }
}
