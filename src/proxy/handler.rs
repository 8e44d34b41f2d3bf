use async_trait::async_trait;
use http::{Response, StatusCode};
use std::time::Instant;
use tracing::{debug, error};

use super::special_endpoints::{handle_health, handle_metrics, handle_unknown};
use crate::hostid::HostPattern;
use crate::pipeline::{text_response, Body, Handler, RequestContext};
use crate::resolver::CachedResolver;

/// A finished response and the site identity it was served for
pub struct Served {
    pub response: Response<Body>,
    pub identity: Option<String>,
}

/// Entry point for every request: host → identity → site → pipeline.
pub struct EdgeHandler {
    hosts: HostPattern,
    resolver: CachedResolver,
    admin_host: Option<String>,
    start_time: Instant,
}

impl EdgeHandler {
    pub fn new(hosts: HostPattern, resolver: CachedResolver, admin_host: Option<String>) -> Self {
        Self {
            hosts,
            resolver,
            admin_host,
            start_time: Instant::now(),
        }
    }

    pub fn resolver(&self) -> &CachedResolver {
        &self.resolver
    }

    fn is_admin_host(&self, host: &str) -> bool {
        self.admin_host
            .as_deref()
            .map_or(false, |admin| admin.eq_ignore_ascii_case(host))
    }

    fn admin(&self, req: &RequestContext) -> Response<Body> {
        let endpoint = match req.path() {
            "/health" => handle_health(self.start_time, self.resolver.cache().len()),
            "/metrics" => handle_metrics(),
            other => handle_unknown(other),
        };
        endpoint.into_response()
    }

    pub async fn serve(&self, req: RequestContext) -> Served {
        if self.is_admin_host(req.host()) {
            return Served {
                response: self.admin(&req),
                identity: None,
            };
        }

        let Some(identity) = self.hosts.match_host(req.host()) else {
            debug!(request_id = %req.request_id(), host = %req.host(), "host does not match pattern");
            return Served {
                response: text_response(StatusCode::NOT_FOUND, "404 page not found\n"),
                identity: None,
            };
        };

        let response = match self.resolver.resolve(&identity).await {
            Ok(handle) => handle.pipeline.handle(req).await,
            Err(e) if e.is_not_found() => {
                debug!(request_id = %req.request_id(), identity = %identity, "site not found");
                text_response(StatusCode::NOT_FOUND, "404 page not found\n")
            }
            Err(e) => {
                error!(
                    request_id = %req.request_id(),
                    identity = %identity,
                    error = %e,
                    "site resolution failed"
                );
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "500 internal server error\n")
            }
        };

        Served {
            response,
            identity: Some(identity),
        }
    }
}

#[async_trait]
impl Handler for EdgeHandler {
    async fn handle(&self, req: RequestContext) -> Response<Body> {
        self.serve(req).await.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, ContentCache};
    use crate::compression::CompressionConfig;
    use crate::pipeline::PipelineContext;
    use crate::resolver::{AdHocResolver, DefaultSite, ResolveError, Resolver, Site};
    use http::Method;
    use std::sync::Arc;

    struct Broken;

    #[async_trait]
    impl Resolver for Broken {
        async fn resolve(&self, _identity: &str) -> Result<Arc<Site>, ResolveError> {
            Err(ResolveError::Store("connection refused to db.internal:5432".to_string()))
        }
    }

    fn handler(resolver: Arc<dyn Resolver>) -> EdgeHandler {
        let ctx = PipelineContext::new(
            Arc::new(ContentCache::disabled()),
            Arc::new(CompressionConfig::new()),
        );
        EdgeHandler::new(
            HostPattern::new("http://*.localhost"),
            CachedResolver::new(resolver, &CacheConfig::default(), ctx),
            Some("admin.internal".to_string()),
        )
    }

    fn get(host: &str, target: &str) -> RequestContext {
        RequestContext::new(Method::GET, host, target)
    }

    #[tokio::test]
    async fn test_serves_adhoc_site() {
        let root = tempfile::tempdir().unwrap();
        let site = root.path().join("acme");
        std::fs::create_dir_all(&site).unwrap();
        std::fs::write(site.join("site.yaml"), "spa: false\n").unwrap();
        std::fs::write(site.join("index.html"), "acme home").unwrap();

        let edge = handler(Arc::new(AdHocResolver::new(
            root.path(),
            DefaultSite::new("main", true),
        )));
        let served = edge.serve(get("acme.localhost:8080", "/")).await;
        assert_eq!(served.identity.as_deref(), Some("acme"));
        assert_eq!(served.response.status(), StatusCode::OK);
        let body = served.response.into_body().collect().await.unwrap();
        assert_eq!(body.as_ref(), b"acme home");
    }

    #[tokio::test]
    async fn test_unmatched_host_skips_resolution() {
        let edge = handler(Arc::new(Broken));
        let served = edge.serve(get("example.com", "/")).await;
        assert_eq!(served.response.status(), StatusCode::NOT_FOUND);
        assert!(served.identity.is_none());
        assert!(edge.resolver().cache().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_site_is_404() {
        let root = tempfile::tempdir().unwrap();
        let edge = handler(Arc::new(AdHocResolver::new(
            root.path(),
            DefaultSite::new("main", true),
        )));
        let served = edge.serve(get("ghost.localhost", "/")).await;
        assert_eq!(served.response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_infrastructure_error_is_hidden() {
        let edge = handler(Arc::new(Broken));
        let served = edge.serve(get("acme.localhost", "/")).await;
        assert_eq!(served.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = served.response.into_body().collect().await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(!body.contains("db.internal"));
    }

    #[tokio::test]
    async fn test_admin_host() {
        let edge = handler(Arc::new(Broken));
        let health = edge.serve(get("admin.internal", "/health")).await;
        assert_eq!(health.response.status(), StatusCode::OK);

        let metrics = edge.serve(get("ADMIN.internal:9000", "/metrics")).await;
        assert_eq!(metrics.response.status(), StatusCode::OK);

        let other = edge.serve(get("admin.internal", "/secret")).await;
        assert_eq!(other.response.status(), StatusCode::NOT_FOUND);
    }
}
