//! Shared utilities for resolution: share identifier extraction, size formatting, regex init.

use regex::Regex;
use url::Url;

/// Query parameter carrying the share identifier on redirected share pages.
const SHARE_ID_PARAM: &str = "surl";

/// Path segment that precedes the share identifier in short share links.
const SHARE_PATH_SEGMENT: &str = "s";

/// Compiles a regex at static init; panics on invalid pattern.
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Extracts the share identifier from a share page URL.
///
/// Supports:
/// - `https://host/sharing/link?surl=abc` (query parameter, taken verbatim)
/// - `https://host/s/1abc` (path segment, leading `1` stripped)
#[must_use]
pub fn extract_share_id(url: &Url) -> Option<String> {
    if let Some((_, value)) = url
        .query_pairs()
        .find(|(key, value)| key == SHARE_ID_PARAM && !value.trim().is_empty())
    {
        return Some(value.trim().to_string());
    }

    let mut segments = url.path_segments()?;
    segments.find(|segment| *segment == SHARE_PATH_SEGMENT)?;
    let raw = segments.next().filter(|segment| !segment.is_empty())?;
    let id = match raw.strip_prefix('1') {
        Some(rest) if !rest.is_empty() => rest,
        _ => raw,
    };
    Some(id.to_string())
}

/// Formats a byte count for display.
///
/// Below 1024 bytes the exact count is shown; below 1024² bytes KB with two
/// decimals; anything larger MB with two decimals.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;

    if bytes < KIB {
        format!("{bytes} bytes")
    } else if bytes < MIB {
        format!("{:.2} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    }
}
