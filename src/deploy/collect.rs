use std::fs::File;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use super::{hash_reader, DeployError, Manifest, ManifestEntry};

/// Build the manifest of every regular file under `root`.
///
/// Symlinks are followed. Entries come out sorted by path. More than
/// `max_entries` files fails with [`DeployError::TooManyFiles`].
pub fn collect(root: &Path, max_entries: usize) -> Result<Manifest, DeployError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .min_depth(1)
    {
        let entry = entry.map_err(|e| DeployError::Io(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        if files.len() == max_entries {
            return Err(DeployError::TooManyFiles {
                count: max_entries + 1,
                max: max_entries,
            });
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| DeployError::Io(e.to_string()))?;
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let mut file = File::open(entry.path())?;
        let (hash, size) = hash_reader(&mut file)?;
        let content_type = mime_guess::from_path(entry.path())
            .first()
            .map(|mime| mime.to_string())
            .unwrap_or_default();

        debug!(path = %path, size, "collected file");
        files.push(ManifestEntry {
            path,
            size,
            hash,
            content_type,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(Manifest::new(files))
}
