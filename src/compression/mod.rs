//! Response compression
//!
//! - [`algorithms`] - supported encodings and per-algorithm settings
//! - [`config`] - the `compression` config section
//! - [`negotiation`] - Accept-Encoding parsing and algorithm selection
//! - [`compress`] - whole-body encode and bounded decode
//!
//! Static files are compressed once per (content hash, encoding) and the
//! result lives in the content cache, so the cost is paid on the first hit
//! only.

pub mod algorithms;
pub mod compress;
pub mod config;
pub mod error;
pub mod negotiation;

pub use algorithms::{AlgorithmConfig, Compression};
pub use compress::{compress, decompress};
pub use config::CompressionConfig;
pub use error::CompressionError;
pub use negotiation::negotiate_compression;

/// Media types worth compressing. Images, video, archives and fonts other
/// than the uncompressed formats are already dense.
pub fn is_compressible(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if mime.starts_with("text/") {
        return true;
    }
    if mime.ends_with("+json") || mime.ends_with("+xml") {
        return true;
    }
    matches!(
        mime.as_str(),
        "application/javascript"
            | "application/x-javascript"
            | "application/json"
            | "application/manifest+json"
            | "application/xml"
            | "application/wasm"
            | "application/xhtml+xml"
            | "image/svg+xml"
            | "image/x-icon"
            | "image/vnd.microsoft.icon"
            | "font/ttf"
            | "font/otf"
            | "application/vnd.ms-fontobject"
    )
}
