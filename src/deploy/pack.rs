use flate2::write::GzEncoder;
use std::io::Write;
use std::path::Path;

use super::{DeployError, Manifest};

/// Write a gzip-compressed tar of the manifest's files, read from `root`,
/// and return the finished writer.
pub fn pack<W: Write>(root: &Path, manifest: &Manifest, writer: W) -> Result<W, DeployError> {
    let encoder = GzEncoder::new(writer, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.mode(tar::HeaderMode::Deterministic);

    for entry in manifest.regular_files() {
        builder.append_path_with_name(root.join(&entry.path), &entry.path)?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}
