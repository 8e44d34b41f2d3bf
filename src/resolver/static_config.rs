use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use super::{canonical_identity, load_site, DefaultSite, ResolveError, Resolver, Site};
use crate::hostid::HostIdScheme;
use crate::vfs::LocalFs;

/// Serves a fixed set of sites from local directories.
///
/// Keys are canonical identities (`docs.acme`); a tenant-only identity is
/// looked up under the default site (`main.acme`), and the empty identity
/// under the bare default site name (`main`).
pub struct StaticResolver {
    sites: BTreeMap<String, PathBuf>,
    scheme: HostIdScheme,
    default_site: DefaultSite,
}

impl StaticResolver {
    pub fn new<I, K, P>(sites: I, scheme: HostIdScheme, default_site: DefaultSite) -> Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            sites: sites
                .into_iter()
                .map(|(identity, dir)| (identity.into(), dir.into()))
                .collect(),
            scheme,
            default_site,
        }
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, identity: &str) -> Result<Arc<Site>, ResolveError> {
        let key = canonical_identity(self.scheme, &self.default_site, identity)
            .ok_or(ResolveError::NotFound)?;
        let dir = self.sites.get(&key).ok_or(ResolveError::NotFound)?;

        match tokio::fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(ResolveError::Filesystem {
                    site: key,
                    message: format!("{} is not a directory", dir.display()),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(site = %key, dir = %dir.display(), "configured site directory is missing");
                return Err(ResolveError::NotFound);
            }
            Err(e) => {
                return Err(ResolveError::Filesystem {
                    site: key,
                    message: format!("{}: {}", dir.display(), e),
                })
            }
        }

        let site = load_site(key, None, Arc::new(LocalFs::new(dir))).await?;
        Ok(Arc::new(site))
    }
}
