//! Version extraction from component metadata files
//!
//! Plugin `readme.txt` and theme `style.css` files declare their version in a
//! header (`Stable tag: 1.2.3`, `Version: 1.2.3`). When no header is present
//! the changelog headings (`= 1.2.3 =`) are used instead.

use crate::version::SemVer;
use regex::Regex;
use std::sync::LazyLock;

/// Markers of an HTML page or a PHP error served where a text file was expected
const ERROR_PAGE_MARKERS: &[&str] = &["<head", "<body", "Invalid Request", "Parse error"];

/// Development placeholder used instead of a release number
const TRUNK: &str = "trunk";

static DECLARED_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(stable tag|version):\s*([0-9A-Za-z._-]+)").expect("declared tag regex")
});

static CHANGELOG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^=+[ \t]+(?:v(?:ersion)?[ \t]*)?([0-9A-Za-z._-]+)[^=\n]*=+[ \t\r]*$")
        .expect("changelog regex")
});

/// Check whether a body is an HTML or error page instead of a metadata file
pub fn looks_like_error_page(text: &str) -> bool {
    ERROR_PAGE_MARKERS.iter().any(|m| text.contains(m))
}

/// Extract the best-effort version from a metadata file
///
/// Returns an empty string when nothing usable is found.
pub fn extract(text: &str) -> String {
    if looks_like_error_page(text) {
        return String::new();
    }

    from_declared_tag(text)
        .or_else(|| from_changelog(text))
        .unwrap_or_default()
}

/// Version from a `Stable tag:` or `Version:` header
///
/// A release-like `Stable tag:` is preferred over any `Version:` header, which
/// readmes also use for lines such as `Requires PHP version:`.
pub fn from_declared_tag(text: &str) -> Option<String> {
    let mut fallback = None;
    for caps in DECLARED_TAG_RE.captures_iter(text) {
        let (Some(label), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        if !is_release(value.as_str()) {
            continue;
        }
        if label.as_str().eq_ignore_ascii_case("stable tag") {
            return Some(value.as_str().to_string());
        }
        fallback.get_or_insert(value.as_str());
    }
    fallback.map(str::to_string)
}

/// Highest version among the changelog headings
///
/// Changelogs are not reliably ordered, so the maximum wins rather than the
/// first or last entry.
pub fn from_changelog(text: &str) -> Option<String> {
    let mut best: Option<(SemVer, &str)> = None;

    for caps in CHANGELOG_RE.captures_iter(text) {
        let Some(m) = caps.get(1) else { continue };
        let candidate = m.as_str();
        if !is_release(candidate) {
            continue;
        }
        let parsed = SemVer::parse(candidate);
        if best.is_none_or(|(top, _)| parsed > top) {
            best = Some((parsed, candidate));
        }
    }

    best.map(|(_, v)| v.to_string())
}

fn is_release(version: &str) -> bool {
    !version.eq_ignore_ascii_case(TRUNK) && version.chars().any(|c| c.is_ascii_digit())
}
