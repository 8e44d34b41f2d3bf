use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use super::{load_site, DefaultSite, ResolveError, Resolver, Site};
use crate::vfs::LocalFs;

/// Maps identities onto a directory tree for local multi-site development.
///
/// Labels are read right to left: `docs.acme` is served from
/// `<root>/acme/docs`. Any directory carrying a `site.yaml` is a site.
pub struct AdHocResolver {
    root: PathBuf,
    default_site: DefaultSite,
}

impl AdHocResolver {
    pub fn new(root: impl Into<PathBuf>, default_site: DefaultSite) -> Self {
        Self {
            root: root.into(),
            default_site,
        }
    }

    /// Directory for `identity`, or `None` when a label is unusable as a
    /// path segment.
    pub fn site_dir(&self, identity: &str) -> Option<PathBuf> {
        let identity = if identity.is_empty() {
            self.default_site.alias("")?
        } else {
            identity
        };

        let mut dir = self.root.clone();
        for label in identity.rsplit('.') {
            if label.is_empty() || label == "." || label == ".." || label.contains(['/', '\\']) {
                return None;
            }
            dir.push(label);
        }
        Some(dir)
    }
}

#[async_trait]
impl Resolver for AdHocResolver {
    async fn resolve(&self, identity: &str) -> Result<Arc<Site>, ResolveError> {
        let dir = self.site_dir(identity).ok_or(ResolveError::NotFound)?;

        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(ResolveError::NotFound),
        }

        let id = if identity.is_empty() {
            self.default_site.name.clone()
        } else {
            identity.to_string()
        };
        let site = load_site(id, None, Arc::new(LocalFs::new(dir))).await?;
        Ok(Arc::new(site))
    }
}
