use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::{ResolveError, Resolver, Site};
use crate::cache::{CacheConfig, DedupCache};
use crate::metrics::Metrics;
use crate::pipeline::{build_pipeline, Handler, PipelineContext};

/// A resolved site together with its request pipeline
#[derive(Clone)]
pub struct SiteHandle {
    pub site: Arc<Site>,
    pub pipeline: Arc<dyn Handler>,
}

impl std::fmt::Debug for SiteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteHandle")
            .field("site", &self.site.id)
            .finish()
    }
}

/// Caches resolutions (successes and failures) per site identity.
///
/// Concurrent requests for the same identity share one backend resolution.
pub struct CachedResolver {
    inner: Arc<dyn Resolver>,
    cache: DedupCache<String, SiteHandle, ResolveError>,
    ctx: PipelineContext,
}

impl CachedResolver {
    pub fn new(inner: Arc<dyn Resolver>, config: &CacheConfig, ctx: PipelineContext) -> Self {
        let cache = DedupCache::new(config.site_ttl(), config.max_sites)
            .with_error_ttl(config.error_ttl());
        Self { inner, cache, ctx }
    }

    pub async fn resolve(&self, identity: &str) -> Result<SiteHandle, ResolveError> {
        let loaded = AtomicBool::new(false);
        let key = identity.to_string();

        let result = self
            .cache
            .load(&key, || async {
                loaded.store(true, Ordering::Relaxed);
                debug!(identity = %identity, "resolving site");
                let site = self.inner.resolve(identity).await?;
                let pipeline = build_pipeline(Arc::clone(&site), &self.ctx);
                Ok(SiteHandle { site, pipeline })
            })
            .await;

        let metrics = Metrics::global();
        if !loaded.load(Ordering::Relaxed) {
            metrics.record_resolution("hit");
        } else {
            match &result {
                Ok(_) => metrics.record_resolution("load"),
                Err(e) => metrics.record_resolution(e.kind()),
            }
        }
        result
    }

    /// Forget the cached resolution for `identity`.
    pub fn invalidate(&self, identity: &str) {
        self.cache.invalidate(&identity.to_string());
    }

    pub fn cache(&self) -> &DedupCache<String, SiteHandle, ResolveError> {
        &self.cache
    }
}
