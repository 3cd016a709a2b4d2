//! WordPress fingerprinting
//!
//! A reachable host may serve WordPress from its root, from `/blog` or `/wp`,
//! from its `www.` twin or from a `blog.` subdomain. The variants are fetched
//! in that order and the first body carrying a WordPress fingerprint wins.

use crate::http::Fetcher;
use crate::resolve::first_success;
use crate::secrets;
use crate::sink::FindingSink;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

/// Body substrings that identify WordPress
const FINGERPRINTS: &[&str] = &["wp-content", "wp-includes", r#"generator" content="WordPress"#];

/// Paths tried on each host variant
const PATH_VARIANTS: &[&str] = &["", "/blog", "/wp"];

static GENERATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+name=["']generator["']\s+content=["']WordPress\s*([\d.]+)["']"#)
        .expect("generator regex")
});

/// A confirmed WordPress installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Canonical URL of the installation, no trailing slash
    pub url: String,
    /// Version from the generator meta tag
    pub version: Option<String>,
}

/// Check whether a body carries a WordPress fingerprint
pub fn is_wordpress(body: &str) -> bool {
    FINGERPRINTS.iter().any(|f| body.contains(f))
}

/// Version advertised by the generator meta tag
pub fn generator_version(html: &str) -> Option<String> {
    version_from_meta(html).or_else(|| {
        GENERATOR_RE
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

fn version_from_meta(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("meta[name='generator']").ok()?;

    for element in document.select(&selector) {
        if let Some(content) = element.value().attr("content")
            && let Some(rest) = content.trim().strip_prefix("WordPress")
        {
            let version: String = rest
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            if version.chars().any(|c| c.is_ascii_digit()) {
                return Some(version);
            }
        }
    }
    None
}

/// URL variants of a resolved target in probing order
pub fn variants(resolved_url: &str) -> Vec<String> {
    let Ok(url) = Url::parse(resolved_url) else {
        return Vec::new();
    };
    let Some(host) = url.host_str() else {
        return Vec::new();
    };
    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    let port = port.as_str();
    let scheme = url.scheme();
    let bare = host.strip_prefix("www.").unwrap_or(host);

    let mut hosts = vec![host.to_string(), format!("www.{}", bare)];
    hosts.dedup();

    let mut urls: Vec<String> = hosts
        .iter()
        .flat_map(|h| {
            PATH_VARIANTS
                .iter()
                .map(move |path| format!("{}://{}{}{}", scheme, h, port, path))
        })
        .collect();
    urls.push(format!("{}://blog.{}{}", scheme, bare, port));
    urls
}

/// Decides whether a target runs WordPress
pub struct FingerprintDetector<'a> {
    fetcher: &'a dyn Fetcher,
    sink: &'a dyn FindingSink,
}

impl<'a> FingerprintDetector<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, sink: &'a dyn FindingSink) -> Self {
        Self { fetcher, sink }
    }

    /// Find the canonical WordPress URL of a resolved target
    ///
    /// Every fetched body is scanned for secrets, matched or not.
    pub async fn detect(&self, resolved_url: &str) -> Option<Detection> {
        first_success(variants(resolved_url), |url| async move {
            let body = match self.fetcher.get_body(&url).await {
                Ok(body) => body,
                Err(e) => {
                    debug!(url = %url, error = %e, "variant not fetched");
                    return None;
                }
            };
            secrets::report(self.sink, &body, &url).await;

            if !is_wordpress(&body) {
                return None;
            }
            let version = generator_version(&body);
            Some(Detection { url, version })
        })
        .await
    }
}
