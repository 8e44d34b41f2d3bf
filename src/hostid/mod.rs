//! Host identity encoding
//!
//! A tenant (`main`) and one of its sites (`sub`) are packed into a single
//! DNS label sequence. Two schemes are supported:
//! - `subdomain`: `sub.main` (e.g. `preview.acme`)
//! - `suffix`: `sub--main`, with literal hyphens in `sub` escaped as `-x`
//!   (e.g. `feature-xlogin--acme` for site `feature-login`)
//!
//! The [`HostPattern`] decides which part of an incoming hostname is the
//! identity in the first place.

mod pattern;

pub use pattern::HostPattern;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SUFFIX_SEPARATOR: &str = "--";

/// Encoding scheme for `(main, sub)` identity pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HostIdScheme {
    /// `sub.main`
    #[default]
    Subdomain,
    /// `sub--main`
    Suffix,
}

impl HostIdScheme {
    /// Split a host identity into `(main, sub)`.
    ///
    /// An identity without separator yields `(host_id, "")`.
    pub fn split(&self, host_id: &str) -> (String, String) {
        match self {
            HostIdScheme::Subdomain => match host_id.split_once('.') {
                Some((sub, main)) => (main.to_string(), sub.to_string()),
                None => (host_id.to_string(), String::new()),
            },
            HostIdScheme::Suffix => match host_id.rsplit_once(SUFFIX_SEPARATOR) {
                Some((sub, main)) => (main.to_string(), sub.replace("-x", "-")),
                None => (host_id.to_string(), String::new()),
            },
        }
    }

    /// Join `main` and `sub` into a host identity (inverse of [`split`](Self::split)).
    pub fn make(&self, main: &str, sub: &str) -> String {
        if sub.is_empty() {
            return main.to_string();
        }
        match self {
            HostIdScheme::Subdomain => format!("{}.{}", sub, main),
            HostIdScheme::Suffix => {
                format!("{}{}{}", sub.replace('-', "-x"), SUFFIX_SEPARATOR, main)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostIdScheme::Subdomain => "subdomain",
            HostIdScheme::Suffix => "suffix",
        }
    }
}

impl FromStr for HostIdScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "subdomain" => Ok(HostIdScheme::Subdomain),
            "suffix" => Ok(HostIdScheme::Suffix),
            _ => Err(format!("unknown host id scheme: {}", s)),
        }
    }
}

impl fmt::Display for HostIdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
