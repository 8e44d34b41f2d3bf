// Range request parsing (RFC 9110 §14)

/// One `first-last` item; either bound may be absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRange {
    /// `None` for suffix ranges (`-500`)
    pub start: Option<u64>,
    /// `None` for open-ended ranges (`500-`)
    pub end: Option<u64>,
}

impl ByteRange {
    /// Resolve against a body of `size` bytes into an inclusive
    /// `(first, last)` pair. `None` means unsatisfiable.
    pub fn resolve(&self, size: u64) -> Option<(u64, u64)> {
        if size == 0 {
            return None;
        }
        match (self.start, self.end) {
            (Some(start), end) => {
                if start >= size {
                    return None;
                }
                let last = end.map_or(size - 1, |end| end.min(size - 1));
                (last >= start).then_some((start, last))
            }
            (None, Some(suffix)) => {
                if suffix == 0 {
                    return None;
                }
                Some((size.saturating_sub(suffix), size - 1))
            }
            (None, None) => None,
        }
    }
}

/// Parsed `Range` header value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeHeader {
    pub unit: String,
    pub ranges: Vec<ByteRange>,
}

impl RangeHeader {
    /// The single byte range, if this header asks for exactly one.
    pub fn single_bytes_range(&self) -> Option<&ByteRange> {
        match self.ranges.as_slice() {
            [range] if self.unit.eq_ignore_ascii_case("bytes") => Some(range),
            _ => None,
        }
    }
}

/// Parse `bytes=0-1023`, `bytes=1000-`, `bytes=-500` or comma-separated
/// lists of those. Malformed headers yield `None` and are ignored.
pub fn parse_range_header(header_value: &str) -> Option<RangeHeader> {
    let (unit, ranges_str) = header_value.trim().split_once('=')?;
    let unit = unit.trim();
    if unit.is_empty() {
        return None;
    }

    let mut ranges = Vec::new();
    for range_str in ranges_str.split(',') {
        let (start_str, end_str) = range_str.trim().split_once('-')?;
        let start = parse_bound(start_str)?;
        let end = parse_bound(end_str)?;

        if start.is_none() && end.is_none() {
            return None;
        }
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                return None;
            }
        }
        ranges.push(ByteRange { start, end });
    }

    Some(RangeHeader {
        unit: unit.to_string(),
        ranges,
    })
}

/// Empty bound → `Some(None)`; digits → `Some(Some(n))`; anything else → `None`.
fn parse_bound(s: &str) -> Option<Option<u64>> {
    let s = s.trim();
    if s.is_empty() {
        return Some(None);
    }
    s.parse::<u64>().ok().map(Some)
}
