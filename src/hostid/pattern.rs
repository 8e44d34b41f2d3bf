//! Host pattern matching
//!
//! A pattern such as `https://*.pages.example.com:8443` is decomposed into a
//! scheme, a prefix, a suffix and a port around its single `*` wildcard.
//! Incoming hosts are matched against prefix/suffix (ports ignored) and the
//! text standing in for the wildcard is the site identity.

use std::fmt;

const WILDCARD: char = '*';

/// Decomposed host pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPattern {
    scheme: String,
    prefix: String,
    suffix: String,
    port: String,
    /// Suffix was written as `.suffix`; a separating dot goes between
    /// identity and suffix.
    dotted: bool,
}

impl HostPattern {
    /// Build a pattern. Never fails: a pattern without wildcard matches any
    /// host wholesale.
    pub fn new(pattern: &str) -> Self {
        let pattern = pattern.trim().to_lowercase();

        let (scheme, rest) = match pattern.find("://") {
            Some(idx) => (pattern[..idx + 3].to_string(), &pattern[idx + 3..]),
            None => (String::new(), pattern.as_str()),
        };

        let (host, port) = split_port(rest);

        let (prefix, suffix) = match host.split_once(WILDCARD) {
            Some((prefix, suffix)) => (prefix.to_string(), suffix.to_string()),
            None => (String::new(), String::new()),
        };

        let (suffix, dotted) = match suffix.strip_prefix('.') {
            Some(stripped) => (stripped.to_string(), true),
            None => (suffix, false),
        };

        Self {
            scheme,
            prefix,
            suffix,
            port: port.to_string(),
            dotted,
        }
    }

    /// Match a `Host` header value, returning the identity on success.
    pub fn match_host(&self, host: &str) -> Option<String> {
        let host = host.trim().to_lowercase();
        let (host, _port) = split_port(&host);

        let rest = host.strip_prefix(self.prefix.as_str())?;
        let middle = rest.strip_suffix(self.suffix.as_str())?;

        if middle.is_empty() {
            return Some(String::new());
        }

        if self.dotted && !self.suffix.is_empty() {
            // `evilexample.com` must not match `*.example.com`
            return middle.strip_suffix('.').map(str::to_string);
        }

        Some(middle.strip_suffix('.').unwrap_or(middle).to_string())
    }

    /// Build the canonical URL (scheme, host and port) for an identity.
    pub fn make_url(&self, value: &str) -> String {
        let separator = if self.dotted && !value.is_empty() && !self.suffix.is_empty() {
            "."
        } else {
            ""
        };
        format!(
            "{}{}{}{}{}{}",
            self.scheme, self.prefix, value, separator, self.suffix, self.port
        )
    }

    /// Host part of [`make_url`](Self::make_url), without scheme or port.
    pub fn make_host(&self, value: &str) -> String {
        let url = self.make_url(value);
        let host = url.strip_prefix(self.scheme.as_str()).unwrap_or(url.as_str());
        split_port(host).0.to_string()
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn port(&self) -> &str {
        &self.port
    }
}

impl fmt::Display for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dot = if self.dotted { "." } else { "" };
        write!(
            f,
            "{}{}{}{}{}{}",
            self.scheme, self.prefix, WILDCARD, dot, self.suffix, self.port
        )
    }
}

/// Split `host:port` into `("host", ":port")`. IPv6 literals keep their
/// brackets; only a trailing all-digit port is removed.
fn split_port(host: &str) -> (&str, &str) {
    match host.rfind(':') {
        Some(idx)
            if !host[idx + 1..].is_empty()
                && host[idx + 1..].bytes().all(|b| b.is_ascii_digit())
                && !host[..idx].ends_with(':') =>
        {
            (&host[..idx], &host[idx..])
        }
        _ => (host, ""),
    }
}
