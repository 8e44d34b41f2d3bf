use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{load_site, DefaultSite, ResolveError, Resolver, Site, SiteStore, StoreError};
use crate::hostid::HostIdScheme;
use crate::storage::BlobStore;
use crate::vfs::ManifestFs;

/// Resolves uploaded deployments recorded in a [`SiteStore`]
pub struct DatabaseResolver {
    store: Arc<dyn SiteStore>,
    blobs: Arc<dyn BlobStore>,
    scheme: HostIdScheme,
    resolve_default_site: bool,
}

impl DatabaseResolver {
    pub fn new(
        store: Arc<dyn SiteStore>,
        blobs: Arc<dyn BlobStore>,
        scheme: HostIdScheme,
        resolve_default_site: bool,
    ) -> Self {
        Self {
            store,
            blobs,
            scheme,
            resolve_default_site,
        }
    }
}

fn store_error(err: StoreError) -> ResolveError {
    match err {
        StoreError::NotFound => ResolveError::NotFound,
        other => ResolveError::Store(other.to_string()),
    }
}

#[async_trait]
impl Resolver for DatabaseResolver {
    async fn resolve(&self, identity: &str) -> Result<Arc<Site>, ResolveError> {
        let (app_id, site) = self.scheme.split(identity);
        if app_id.is_empty() {
            return Err(ResolveError::NotFound);
        }

        let app = self.store.get_app(&app_id).await.map_err(store_error)?;

        let default_site =
            DefaultSite::new(app.config.default_site.as_str(), self.resolve_default_site);
        let site = default_site
            .alias(&site)
            .ok_or(ResolveError::NotFound)?
            .to_string();

        let declaration = app
            .config
            .match_site(&site)
            .map_err(|e| ResolveError::InvalidConfig {
                site: format!("{}/{}", app_id, site),
                message: e,
            })?
            .ok_or_else(|| {
                debug!(app = %app_id, site = %site, "site not declared by app");
                ResolveError::NotFound
            })?;

        let deployment = self
            .store
            .get_active_site_deployment(&app_id, &site)
            .await
            .map_err(store_error)?;

        let id = format!("{}/{}", app_id, site);
        let uploaded_at = deployment.uploaded_at.ok_or_else(|| {
            warn!(
                site = %id,
                deployment = %deployment.id,
                "active deployment has no upload time"
            );
            ResolveError::InvalidDeployment {
                site: id.clone(),
                reason: format!("deployment {} was never uploaded", deployment.id),
            }
        })?;

        let fs = Arc::new(ManifestFs::new(
            &deployment.manifest,
            Arc::clone(&self.blobs),
            deployment.storage_prefix.as_str(),
            uploaded_at,
        ));

        debug!(
            site = %id,
            deployment = %deployment.id,
            files = deployment.manifest.files.len(),
            "resolved deployment"
        );
        let site = load_site(id, declaration.domain_for(&site), fs).await?;
        Ok(Arc::new(site))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::{hash_bytes, Manifest, ManifestEntry};
    use crate::resolver::{App, AppConfig, Deployment, MemorySiteStore, SiteDeclaration};
    use crate::storage::MemoryBlobStore;
    use crate::vfs::read_to_bytes;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};

    fn entry(path: &str, body: &[u8]) -> ManifestEntry {
        ManifestEntry {
            path: path.to_string(),
            size: body.len() as u64,
            hash: hash_bytes(body),
            content_type: String::new(),
        }
    }

    async fn fixture(uploaded: bool) -> (Arc<MemorySiteStore>, MemoryBlobStore) {
        let blobs = MemoryBlobStore::new();
        let files: [(&str, &[u8]); 2] = [
            ("site.yaml", b"public: www\n"),
            ("www/index.html", b"<h1>acme</h1>"),
        ];
        for (path, body) in files {
            blobs
                .upload(&format!("acme/main/d1/{}", path), Bytes::from_static(body))
                .await
                .unwrap();
        }

        let store = Arc::new(MemorySiteStore::new());
        store
            .put_app(App {
                id: "acme".to_string(),
                config: AppConfig {
                    default_site: "main".to_string(),
                    sites: vec![
                        SiteDeclaration::new("main").with_domain("www.acme.com"),
                        SiteDeclaration::new("preview-*"),
                    ],
                },
            })
            .await;
        store
            .activate(Deployment {
                id: "d1".to_string(),
                app_id: "acme".to_string(),
                site: "main".to_string(),
                storage_prefix: "acme/main/d1/".to_string(),
                manifest: Manifest::new(files.iter().map(|(p, b)| entry(p, b)).collect()),
                uploaded_at: uploaded.then(|| Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            })
            .await;
        (store, blobs)
    }

    fn resolver(
        store: Arc<MemorySiteStore>,
        blobs: MemoryBlobStore,
        default: bool,
    ) -> DatabaseResolver {
        DatabaseResolver::new(store, Arc::new(blobs), HostIdScheme::Subdomain, default)
    }

    #[tokio::test]
    async fn test_resolves_explicit_site() {
        let (store, blobs) = fixture(true).await;
        let site = resolver(store, blobs, true).resolve("main.acme").await.unwrap();

        assert_eq!(site.id, "acme/main");
        assert_eq!(site.domain.as_deref(), Some("www.acme.com"));
        assert_eq!(site.config.public, "/www");
        assert_eq!(
            read_to_bytes(site.fs.as_ref(), "/index.html").await.unwrap(),
            Bytes::from_static(b"<h1>acme</h1>")
        );
    }

    #[tokio::test]
    async fn test_default_site_alias() {
        let (store, blobs) = fixture(true).await;
        let site = resolver(store, blobs, true).resolve("acme").await.unwrap();
        assert_eq!(site.id, "acme/main");
    }

    #[tokio::test]
    async fn test_default_site_disabled() {
        let (store, blobs) = fixture(true).await;
        let err = resolver(store, blobs, false).resolve("acme").await.unwrap_err();
        assert_eq!(err, ResolveError::NotFound);
    }

    #[tokio::test]
    async fn test_unknown_app_and_undeclared_site() {
        let (store, blobs) = fixture(true).await;
        let resolver = resolver(store, blobs, true);
        assert_eq!(
            resolver.resolve("main.ghost").await.unwrap_err(),
            ResolveError::NotFound
        );
        assert_eq!(
            resolver.resolve("docs.acme").await.unwrap_err(),
            ResolveError::NotFound
        );
        // Declared by pattern but nothing deployed
        assert_eq!(
            resolver.resolve("preview-1.acme").await.unwrap_err(),
            ResolveError::NotFound
        );
    }

    #[tokio::test]
    async fn test_deployment_without_upload_time_is_an_error() {
        let (store, blobs) = fixture(false).await;
        let err = resolver(store, blobs, true).resolve("main.acme").await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidDeployment { .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_missing_site_yaml_is_not_found() {
        let blobs = MemoryBlobStore::new();
        let store = Arc::new(MemorySiteStore::new());
        store
            .put_app(App {
                id: "acme".to_string(),
                config: AppConfig {
                    default_site: "main".to_string(),
                    sites: vec![SiteDeclaration::new("*")],
                },
            })
            .await;
        store
            .activate(Deployment {
                id: "d2".to_string(),
                app_id: "acme".to_string(),
                site: "main".to_string(),
                storage_prefix: "acme/main/d2/".to_string(),
                manifest: Manifest::new(vec![entry("index.html", b"hi")]),
                uploaded_at: Some(Utc::now()),
            })
            .await;

        let err = resolver(store, blobs, true).resolve("acme").await.unwrap_err();
        assert_eq!(err, ResolveError::NotFound);
    }
}
