/// Accept-Encoding negotiation
use std::str::FromStr;

use super::algorithms::Compression;
use super::config::CompressionConfig;

/// One `coding;q=value` item of an Accept-Encoding header
#[derive(Debug, Clone, PartialEq)]
struct EncodingPreference {
    encoding: String,
    quality: f32,
}

impl EncodingPreference {
    fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(';');
        let encoding = parts.next()?.trim().to_ascii_lowercase();
        if encoding.is_empty() {
            return None;
        }

        let quality = parts
            .filter_map(|param| param.trim().strip_prefix("q="))
            .next()
            .map(|q| q.trim().parse::<f32>().unwrap_or(0.0))
            .unwrap_or(1.0);

        Some(EncodingPreference { encoding, quality })
    }
}

/// Pick the response encoding for `accept_encoding`.
///
/// The client's highest q-value wins; ties go to the server preference
/// (br, gzip, deflate). `*` stands for every enabled algorithm not listed
/// explicitly. `None` means identity.
pub fn negotiate_compression(
    accept_encoding: Option<&str>,
    config: &CompressionConfig,
) -> Option<Compression> {
    if !config.enabled {
        return None;
    }

    let preferences: Vec<EncodingPreference> = accept_encoding?
        .split(',')
        .filter_map(EncodingPreference::parse)
        .collect();

    let wildcard = preferences
        .iter()
        .find(|pref| pref.encoding == "*")
        .map(|pref| pref.quality);

    let quality_of = |algo: Compression| -> f32 {
        preferences
            .iter()
            .find(|pref| {
                Compression::from_str(&pref.encoding)
                    .map(|parsed| parsed == algo)
                    .unwrap_or(false)
            })
            .map(|pref| pref.quality)
            .or(wildcard)
            .unwrap_or(0.0)
    };

    let mut best: Option<(Compression, f32)> = None;
    for algo in Compression::PREFERENCE {
        if !config.is_algorithm_enabled(algo) {
            continue;
        }
        let quality = quality_of(algo);
        if quality <= 0.0 {
            continue;
        }
        // Strictly greater keeps the earlier (preferred) algorithm on ties
        if best.map_or(true, |(_, q)| quality > q) {
            best = Some((algo, quality));
        }
    }

    best.map(|(algo, _)| algo)
}
