//! Reachability resolution
//!
//! A domain is tried as `https://host`, `http://host`, `https://www.host` and
//! `http://www.host`, in that order. The first candidate that answers with a
//! live status becomes the target for every later check.

use crate::http::Fetcher;
use std::future::Future;
use tracing::debug;
use url::Url;

/// Schemes in probing order
const SCHEMES: &[&str] = &["https", "http"];

/// The URL variant that represents a domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Scheme and host, no trailing slash
    pub base_url: String,
    pub scheme: String,
}

/// Consume candidates in order and stop at the first one the probe accepts
///
/// Later candidates are never probed once one succeeds.
pub async fn first_success<T, R, F, Fut>(
    candidates: impl IntoIterator<Item = T>,
    mut probe: F,
) -> Option<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Option<R>>,
{
    for candidate in candidates {
        if let Some(found) = probe(candidate).await {
            return Some(found);
        }
    }
    None
}

/// Strip scheme, path and whitespace from a domain list entry
pub fn normalize_domain(raw: &str) -> Option<String> {
    let mut host = raw.trim();
    for prefix in ["https://", "http://"] {
        if let Some(head) = host.get(..prefix.len())
            && head.eq_ignore_ascii_case(prefix)
        {
            host = &host[prefix.len()..];
        }
    }
    let host = host.split(['/', '?', '#']).next().unwrap_or_default().trim();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

/// Candidate base URLs in probing order
pub fn candidates(host: &str) -> Vec<String> {
    let mut hosts = vec![host.to_string()];
    if !host.starts_with("www.") {
        hosts.push(format!("www.{}", host));
    }

    hosts
        .iter()
        .flat_map(|h| SCHEMES.iter().map(move |scheme| format!("{}://{}", scheme, h)))
        .filter(|candidate| Url::parse(candidate).is_ok())
        .collect()
}

/// Finds the first live URL variant of a domain
pub struct ReachabilityResolver<'a> {
    fetcher: &'a dyn Fetcher,
}

impl<'a> ReachabilityResolver<'a> {
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self { fetcher }
    }

    /// Resolve a domain list entry; `None` when no variant is live
    pub async fn resolve(&self, domain: &str) -> Option<ResolvedTarget> {
        let host = normalize_domain(domain)?;

        first_success(candidates(&host), |candidate| async move {
            if self.fetcher.is_live(&candidate).await {
                let scheme = candidate
                    .split_once("://")
                    .map(|(s, _)| s.to_string())
                    .unwrap_or_default();
                Some(ResolvedTarget {
                    base_url: candidate,
                    scheme,
                })
            } else {
                debug!(url = %candidate, "not reachable");
                None
            }
        })
        .await
    }
}
