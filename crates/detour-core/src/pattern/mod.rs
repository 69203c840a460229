//! Match pattern derivation and evaluation
//!
//! Converts raw user-entered blocklist entries (domains, URLs, or existing
//! wildcard patterns) into a deduplicated set of host match patterns, and
//! evaluates URLs against them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;
use url::Url;

/// A wildcard URL pattern in host match syntax, e.g. `*://*.example.com/*`.
///
/// Patterns derived from blocklist entries always have this shape; entries
/// that already contain a `*` are carried as-is, so a pattern may hold any
/// string the user typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchPattern(String);

impl MatchPattern {
    /// Wrap a raw pattern string without validation.
    pub fn from_raw(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// Build the canonical pattern covering a host and all its subdomains:
    /// `*://*.<host>/*`.
    pub fn for_host(host: &str) -> Self {
        Self(format!("*://*.{host}/*"))
    }

    /// The pattern as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a URL is covered by this pattern.
    ///
    /// Supports the practical subset of the match pattern grammar:
    /// scheme `*` (http or https) or a literal scheme, host `*`, `*.host`
    /// (host and any subdomain) or a literal host, and a path glob where `*`
    /// matches any run of characters. Patterns outside this grammar match
    /// nothing.
    pub fn matches(&self, url: &Url) -> bool {
        let Some((scheme, host, path)) = self.split_parts() else {
            return false;
        };

        match scheme {
            "*" => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return false;
                }
            }
            s => {
                if !url.scheme().eq_ignore_ascii_case(s) {
                    return false;
                }
            }
        }

        let Some(url_host) = url.host_str() else {
            return false;
        };
        if !host_matches(host, url_host) {
            return false;
        }

        glob_match(path, url.path())
    }

    /// Split into `(scheme, host, path)`, or `None` if the pattern does not
    /// have the `scheme://host/path` shape. A missing path is treated as `/*`.
    fn split_parts(&self) -> Option<(&str, &str, &str)> {
        let (scheme, rest) = self.0.split_once("://")?;
        match rest.find('/') {
            Some(idx) => Some((scheme, &rest[..idx], &rest[idx..])),
            None => Some((scheme, rest, "/*")),
        }
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn host_matches(pattern_host: &str, url_host: &str) -> bool {
    if pattern_host == "*" {
        return true;
    }
    if let Some(suffix) = pattern_host.strip_prefix("*.") {
        // `*.example.com` covers the bare host and every subdomain
        if url_host.eq_ignore_ascii_case(suffix) {
            return true;
        }
        let mut current = url_host;
        while let Some(pos) = current.find('.') {
            current = &current[pos + 1..];
            if current.eq_ignore_ascii_case(suffix) {
                return true;
            }
        }
        return false;
    }
    pattern_host.eq_ignore_ascii_case(url_host)
}

/// Glob match where `*` matches any (possibly empty) run of characters.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && p[pi] == b'*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

/// Convert raw user entries into a deduplicated pattern list.
///
/// Entries that are not strings are dropped, strings are trimmed and empty
/// results discarded. An entry containing `*` is kept verbatim; anything else
/// is parsed as a URL (retrying with an `https://` prefix) and reduced to a
/// host pattern. Entries with no usable host are dropped silently.
///
/// The returned list is deduplicated with first-occurrence order preserved.
pub fn entries_to_patterns(entries: &[Value]) -> Vec<MatchPattern> {
    let mut seen = HashSet::new();
    let mut patterns = Vec::new();

    for entry in sanitize_entries(entries) {
        let Some(pattern) = entry_to_pattern(&entry) else {
            debug!(entry = %entry, "dropping blocklist entry with no usable host");
            continue;
        };
        if seen.insert(pattern.clone()) {
            patterns.push(pattern);
        }
    }

    patterns
}

/// Keep only string entries, trimmed, with empty results dropped.
fn sanitize_entries(entries: &[Value]) -> Vec<String> {
    entries
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Derive the match pattern for a single sanitized entry.
///
/// Returns `None` when the entry cannot be reduced to a host. An entry that
/// already contains a wildcard marker is treated as a literal pattern.
pub fn entry_to_pattern(entry: &str) -> Option<MatchPattern> {
    if entry.is_empty() {
        return None;
    }

    if entry.contains('*') {
        return Some(MatchPattern::from_raw(entry));
    }

    let url = parse_lenient(entry)?;
    let host = url.host_str()?;

    let host = if host.len() >= 4 && host[..4].eq_ignore_ascii_case("www.") {
        &host[4..]
    } else {
        host
    };
    if host.is_empty() {
        return None;
    }

    Some(MatchPattern::for_host(host))
}

/// Parse as an absolute URL, retrying with an `https://` prefix when the
/// first attempt is not parseable at all. A parse that succeeds without a
/// host does not retry.
fn parse_lenient(entry: &str) -> Option<Url> {
    Url::parse(entry)
        .or_else(|_| Url::parse(&format!("https://{entry}")))
        .ok()
}
