//! URL pattern matching shared by transport and mock lookup.
//!
//! A pattern without `*` matches only the identical URL. Each `*` matches
//! any run of characters, `/` included, and the whole URL must match. There
//! are no other metacharacters; everything else is literal and
//! case-sensitive.
//!
//! Resolution over a set of patterns prefers an exact string match wherever
//! it was registered, then the first wildcard in registration order. A more
//! specific wildcard registered later does not win: register it first.

use regex::Regex;

use crate::error::ConfigError;

/// A compiled URL pattern.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    raw: String,
    glob: Option<Regex>,
}

impl UrlPattern {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ConfigError> {
        let raw = raw.into();
        let glob = if raw.contains('*') {
            let body = raw
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            let compiled = Regex::new(&format!("^(?s:{body})$")).map_err(|e| {
                ConfigError::InvalidPattern {
                    pattern: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
            Some(compiled)
        } else {
            None
        };
        Ok(Self { raw, glob })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.glob.is_some()
    }

    pub fn is_exact(&self, url: &str) -> bool {
        self.raw == url
    }

    pub fn matches(&self, url: &str) -> bool {
        if self.is_exact(url) {
            return true;
        }
        match &self.glob {
            Some(glob) => glob.is_match(url),
            None => false,
        }
    }
}

/// One-off match of `url` against an uncompiled pattern.
pub fn matches(url: &str, pattern: &str) -> bool {
    UrlPattern::parse(pattern)
        .map(|p| p.matches(url))
        .unwrap_or(false)
}

/// Pick the best entry for `url`: exact match first, then the first
/// matching wildcard in iteration order.
pub fn resolve<'a, V>(
    url: &str,
    entries: impl IntoIterator<Item = (&'a UrlPattern, V)>,
) -> Option<V> {
    let mut first_wildcard = None;
    for (pattern, value) in entries {
        if pattern.is_exact(url) {
            return Some(value);
        }
        if first_wildcard.is_none() && pattern.is_wildcard() && pattern.matches(url) {
            first_wildcard = Some(value);
        }
    }
    first_wildcard
}
