// Shared fixtures for integration tests: on-disk site trees, in-memory
// tenants with ingested deployments, and an edge handler wired around them.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use http::Method;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use siteedge::cache::{CacheConfig, ContentCache};
use siteedge::compression::CompressionConfig;
use siteedge::deploy::{self, DeployLimits};
use siteedge::hostid::{HostIdScheme, HostPattern};
use siteedge::pipeline::{Body, PipelineContext, RequestContext};
use siteedge::proxy::EdgeHandler;
use siteedge::resolver::{
    App, AppConfig, CachedResolver, DatabaseResolver, Deployment, MemorySiteStore, ResolveError,
    Resolver, Site, SiteDeclaration,
};
use siteedge::storage::{BlobStore, MemoryBlobStore};

pub const HOST_PATTERN: &str = "http://*.pages.test";

/// Write `files` (relative path, contents) under a fresh temp directory.
pub fn site_tree(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), files);
    dir
}

pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, contents).unwrap();
    }
}

/// A typical single-page app with a docs section
pub fn spa_files() -> Vec<(&'static str, &'static str)> {
    vec![
        ("site.yaml", "public: dist\nnot_found: /404.html\n"),
        ("dist/index.html", "<!doctype html><title>app</title><div id=app></div>"),
        ("dist/404.html", "<h1>nothing here</h1>"),
        ("dist/docs/index.html", "<h1>docs</h1>"),
        ("dist/assets/app.js", "console.log('hello from the app bundle');\n"),
    ]
}

/// Pack `dir`, ingest it into `blobs` and make it the active deployment of
/// `app/site`.
pub async fn deploy_dir(
    store: &MemorySiteStore,
    blobs: Arc<dyn BlobStore>,
    app: &str,
    site: &str,
    deployment_id: &str,
    dir: &Path,
    uploaded: bool,
) {
    let manifest = deploy::collect(dir, 1000).unwrap();
    let archive = deploy::pack(dir, &manifest, Vec::new()).unwrap();
    let prefix = format!("{}/{}/{}/", app, site, deployment_id);

    deploy::ingest(
        &manifest,
        std::io::Cursor::new(archive),
        DeployLimits::default(),
        blobs,
        &prefix,
    )
    .await
    .unwrap();

    store
        .activate(Deployment {
            id: deployment_id.to_string(),
            app_id: app.to_string(),
            site: site.to_string(),
            storage_prefix: prefix,
            manifest,
            uploaded_at: uploaded.then(|| Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        })
        .await;
}

/// App `acme` with sites `main` (default), `docs` (canonical domain) and
/// `preview-*`.
pub fn acme_app() -> App {
    App {
        id: "acme".to_string(),
        config: AppConfig {
            default_site: "main".to_string(),
            sites: vec![
                SiteDeclaration::new("main"),
                SiteDeclaration::new("docs").with_domain("docs.acme.com"),
                SiteDeclaration::new("preview-*"),
            ],
        },
    }
}

/// Wraps a resolver and counts backend resolutions
pub struct Counting<R> {
    pub inner: R,
    pub calls: AtomicUsize,
}

impl<R> Counting<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: Resolver> Resolver for Counting<R> {
    async fn resolve(&self, identity: &str) -> Result<Arc<Site>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(identity).await
    }
}

pub fn pipeline_context() -> PipelineContext {
    PipelineContext::new(
        Arc::new(ContentCache::new(8 * 1024 * 1024, 1024 * 1024)),
        Arc::new(CompressionConfig::new()),
    )
}

pub fn edge(resolver: Arc<dyn Resolver>) -> EdgeHandler {
    EdgeHandler::new(
        HostPattern::new(HOST_PATTERN),
        CachedResolver::new(resolver, &CacheConfig::default(), pipeline_context()),
        Some("admin.pages.test".to_string()),
    )
}

/// Tenant `acme` with the SPA deployed as `main` and `docs`.
pub async fn acme_edge() -> (EdgeHandler, Arc<Counting<DatabaseResolver>>) {
    let store = Arc::new(MemorySiteStore::new());
    let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    store.put_app(acme_app()).await;

    let dir = site_tree(&spa_files());
    deploy_dir(&store, blobs.clone(), "acme", "main", "d-1", dir.path(), true).await;
    deploy_dir(&store, blobs.clone(), "acme", "docs", "d-2", dir.path(), true).await;
    deploy_dir(&store, blobs.clone(), "acme", "preview-7", "d-3", dir.path(), false).await;

    let resolver = Arc::new(Counting::new(DatabaseResolver::new(
        store,
        blobs,
        HostIdScheme::Subdomain,
        true,
    )));
    (edge(resolver.clone()), resolver)
}

pub fn get(host: &str, target: &str) -> RequestContext {
    RequestContext::new(Method::GET, host, target)
}

/// Drain the response body, streamed or not.
pub async fn body_text(response: &mut http::Response<Body>) -> String {
    let body = std::mem::take(response.body_mut());
    String::from_utf8(body.collect().await.unwrap().to_vec()).unwrap()
}
