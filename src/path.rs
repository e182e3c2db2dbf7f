//! Path normalization and segmentation shared by templates and lookups.

use percent_encoding::percent_decode_str;
use std::borrow::Cow;

/// Strips the leading slash and a single trailing slash.
///
/// The root path `/` normalizes to the empty string, which has no segments.
pub fn trim(path: &str) -> &str {
    let path = path.strip_prefix('/').unwrap_or(path);
    path.strip_suffix('/').unwrap_or(path)
}

/// Splits a path into its `/`-delimited segments.
///
/// A doubled slash produces a zero-length segment instead of being skipped:
/// ```ignore
///  /a/b/     ["a", "b"]
///  /a//b     ["a", "", "b"]
///  /         []
/// ```
pub fn segments(path: &str) -> Vec<&str> {
    let trimmed = trim(path);
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('/').collect()
}

/// Percent-decodes a single path segment. Invalid UTF-8 is replaced lossily.
pub fn decode(segment: &str) -> Cow<'_, str> {
    percent_decode_str(segment).decode_utf8_lossy()
}

/// Joins a mount point and a path into a normalized absolute path.
pub fn join(base: &str, path: &str) -> String {
    let base = trim(base);
    let path = trim(path);
    match (base.is_empty(), path.is_empty()) {
        (true, true) => "/".to_owned(),
        (true, false) => format!("/{}", path),
        (false, true) => format!("/{}", base),
        (false, false) => format!("/{}/{}", base, path),
    }
}

/// Returns whether `prefix` covers `path` on a segment boundary.
///
/// `/api` covers `/api` and `/api/users`, but not `/apix`.
pub fn has_prefix(path: &str, prefix: &str) -> bool {
    let path = trim(path);
    let prefix = trim(prefix);
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
