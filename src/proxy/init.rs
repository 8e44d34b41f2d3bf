//! Proxy initialization logic.
//!
//! Turns a validated [`Config`] into the [`EdgeHandler`] that answers every
//! request: the resolver backend, the resolution cache and the shared
//! pipeline resources.

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::EdgeHandler;
use crate::cache::ContentCache;
use crate::config::{Config, ResolverKind};
use crate::error::EdgeError;
use crate::pipeline::PipelineContext;
use crate::resolver::{
    AdHocResolver, CachedResolver, DatabaseResolver, DefaultSite, MemorySiteStore, Resolver,
    StaticResolver,
};
use crate::storage::StorageRegistry;

fn default_site(config: &Config) -> DefaultSite {
    DefaultSite {
        name: config.resolver.default_site.clone(),
        enabled: config.resolver.resolve_default_site,
    }
}

/// Build the resolver backend selected by `resolver.kind`.
pub async fn build_resolver(
    config: &Config,
    registry: &StorageRegistry,
) -> Result<Arc<dyn Resolver>, EdgeError> {
    let resolver = &config.resolver;
    let missing = |field: &str| EdgeError::Config(format!("resolver.{} is required", field));

    let backend: Arc<dyn Resolver> = match resolver.kind {
        ResolverKind::Static => Arc::new(StaticResolver::new(
            resolver.sites.clone(),
            config.hosts.scheme,
            default_site(config),
        )),
        ResolverKind::Adhoc => {
            let root = resolver.root.as_deref().ok_or_else(|| missing("root"))?;
            Arc::new(AdHocResolver::new(root, default_site(config)))
        }
        ResolverKind::Database => {
            let catalog = resolver.catalog.as_deref().ok_or_else(|| missing("catalog"))?;
            let storage = resolver.storage.as_deref().ok_or_else(|| missing("storage"))?;
            let store = MemorySiteStore::from_catalog_file(Path::new(catalog))?;
            let blobs = registry.open(storage).await?;
            Arc::new(DatabaseResolver::new(
                Arc::new(store),
                blobs,
                config.hosts.scheme,
                resolver.resolve_default_site,
            ))
        }
    };

    info!(
        kind = ?resolver.kind,
        default_site = %resolver.default_site,
        resolve_default_site = resolver.resolve_default_site,
        "resolver initialized"
    );
    Ok(backend)
}

/// Shared caches and compression settings handed to every site pipeline.
pub fn build_pipeline_context(config: &Config) -> PipelineContext {
    let content_cache = if config.cache.content.enabled {
        ContentCache::from_config(&config.cache.content)
    } else {
        ContentCache::disabled()
    };
    PipelineContext::new(
        Arc::new(content_cache),
        Arc::new(config.compression.clone()),
    )
}

/// Assemble the edge handler for `config`.
pub async fn initialize_from_config(config: &Config) -> Result<EdgeHandler, EdgeError> {
    let registry = StorageRegistry::with_defaults();
    let backend = build_resolver(config, &registry).await?;
    let resolver = CachedResolver::new(backend, &config.cache, build_pipeline_context(config));

    Ok(EdgeHandler::new(
        config.hosts.host_pattern(),
        resolver,
        config.server.admin_host.clone(),
    ))
}
