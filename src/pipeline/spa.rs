use async_trait::async_trait;
use http::Response;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Body, Handler, RequestContext};
use crate::constants::INDEX_PAGE;
use crate::vfs::{clean_path, parent_path, FileSystem};

/// Single-page application routing: a path that does not exist is served
/// by its nearest existing ancestor, usually the site root.
pub struct SpaFallback {
    fs: Arc<dyn FileSystem>,
    next: Arc<dyn Handler>,
}

impl SpaFallback {
    pub fn new(fs: Arc<dyn FileSystem>, next: Arc<dyn Handler>) -> Self {
        Self { fs, next }
    }

    /// Nearest existing path at or above `path`; the walk stops at `/`.
    async fn nearest_existing(&self, path: &str) -> String {
        let mut candidate = path;
        loop {
            match self.fs.stat(candidate).await {
                Ok(_) => return candidate.to_string(),
                Err(e) if e.is_not_found() => match parent_path(candidate) {
                    Some(parent) => candidate = parent,
                    None => return "/".to_string(),
                },
                Err(e) => {
                    warn!(path = %candidate, error = %e, "stat failed during fallback");
                    return path.to_string();
                }
            }
        }
    }
}

#[async_trait]
impl Handler for SpaFallback {
    async fn handle(&self, mut req: RequestContext) -> Response<Body> {
        let path = clean_path(req.path());
        let target = self.nearest_existing(&path).await;
        if target != path {
            debug!(request_id = %req.request_id(), path = %path, fallback = %target, "spa fallback");
            req.set_path(target);
        }
        self.next.handle(req).await
    }
}

/// Serves directories through their index page.
pub struct IndexPage {
    fs: Arc<dyn FileSystem>,
    next: Arc<dyn Handler>,
}

impl IndexPage {
    pub fn new(fs: Arc<dyn FileSystem>, next: Arc<dyn Handler>) -> Self {
        Self { fs, next }
    }
}

#[async_trait]
impl Handler for IndexPage {
    async fn handle(&self, mut req: RequestContext) -> Response<Body> {
        let path = clean_path(req.path());
        if let Ok(info) = self.fs.stat(&path).await {
            if info.is_dir {
                let index = if path == "/" {
                    format!("/{}", INDEX_PAGE)
                } else {
                    format!("{}/{}", path, INDEX_PAGE)
                };
                req.set_path(index);
            }
        }
        self.next.handle(req).await
    }
}
