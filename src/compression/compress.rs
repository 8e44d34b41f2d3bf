//! Whole-body encoders and bounded decoders
use std::io::{Read, Write};

use super::algorithms::Compression;
use super::error::CompressionError;

/// Encode `data` with `algorithm` at `level`.
pub fn compress(
    data: &[u8],
    algorithm: Compression,
    level: u32,
) -> Result<Vec<u8>, CompressionError> {
    let level = level.min(algorithm.max_level());
    match algorithm {
        Compression::Gzip => {
            let encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::new(level));
            finish_flate(encoder, data, |e| e.finish())
        }
        Compression::Deflate => {
            let encoder =
                flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::new(level));
            finish_flate(encoder, data, |e| e.finish())
        }
        Compression::Brotli => {
            let mut out = Vec::with_capacity(data.len() / 2);
            let mut input = std::io::Cursor::new(data);
            brotli::BrotliCompress(
                &mut input,
                &mut out,
                &brotli::enc::BrotliEncoderParams {
                    quality: level as i32,
                    ..Default::default()
                },
            )
            .map_err(|e| CompressionError::CompressionFailed(format!("brotli: {}", e)))?;
            Ok(out)
        }
    }
}

fn finish_flate<W: Write>(
    mut encoder: W,
    data: &[u8],
    finish: impl FnOnce(W) -> std::io::Result<Vec<u8>>,
) -> Result<Vec<u8>, CompressionError> {
    encoder
        .write_all(data)
        .map_err(|e| CompressionError::CompressionFailed(e.to_string()))?;
    finish(encoder).map_err(|e| CompressionError::CompressionFailed(e.to_string()))
}

/// Decode `data`, failing once the output would exceed `max_size` bytes.
pub fn decompress(
    data: &[u8],
    algorithm: Compression,
    max_size: usize,
) -> Result<Vec<u8>, CompressionError> {
    match algorithm {
        Compression::Gzip => read_bounded(flate2::read::GzDecoder::new(data), max_size),
        Compression::Deflate => read_bounded(flate2::read::DeflateDecoder::new(data), max_size),
        Compression::Brotli => read_bounded(brotli::Decompressor::new(data, 4096), max_size),
    }
}

fn read_bounded<R: Read>(reader: R, max_size: usize) -> Result<Vec<u8>, CompressionError> {
    let mut out = Vec::new();
    reader
        .take(max_size as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))?;

    if out.len() > max_size {
        return Err(CompressionError::DecompressionFailed(format!(
            "output exceeds {} bytes",
            max_size
        )));
    }
    Ok(out)
}
