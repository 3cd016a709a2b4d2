//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use reqwest::Method;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wp_recon::catalog::ComponentSignature;
use wp_recon::{Catalog, ComponentKind, Error, FetchResponse, Fetcher, Result};

/// In-memory transport: routed URLs answer with a fixed status and body,
/// everything else fails like an unreachable host
#[derive(Default)]
pub struct MapFetcher {
    routes: HashMap<String, (u16, String)>,
    calls: Mutex<Vec<(Method, String)>>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), (status, body.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<(Method, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requested(&self, url: &str) -> bool {
        self.calls().iter().any(|(_, u)| u == url)
    }
}

#[async_trait]
impl Fetcher for MapFetcher {
    async fn fetch(&self, method: Method, url: &str) -> Result<FetchResponse> {
        self.calls.lock().unwrap().push((method, url.to_string()));
        match self.routes.get(url) {
            Some((status, body)) => Ok(FetchResponse::new(*status, body.clone())),
            None => Err(Error::HttpRequest(format!("no route to {}", url))),
        }
    }
}

/// Transport that answers every URL with the WordPress home page after a
/// delay and records the highest number of requests in flight at once
pub struct SlowFetcher {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for SlowFetcher {
    async fn fetch(&self, _method: Method, _url: &str) -> Result<FetchResponse> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(FetchResponse::new(200, WORDPRESS_HOME))
    }
}

pub const WORDPRESS_HOME: &str = r#"<!DOCTYPE html>
<html><head>
<meta name="generator" content="WordPress 5.4" />
<link rel="stylesheet" href="https://example.test/wp-content/themes/twentytwenty/style.css" />
</head><body>Hello</body></html>"#;

pub fn catalog(kind: ComponentKind, records: &[&str]) -> Catalog {
    Catalog::new(
        kind,
        records
            .iter()
            .filter_map(|r| ComponentSignature::parse(r))
            .collect(),
    )
}

pub fn readme(stable_tag: &str) -> String {
    format!(
        "=== Akismet Anti-spam ===\nContributors: automattic\nRequires at least: 5.0\nStable tag: {}\n\n== Changelog ==\n= 4.0 =\n* Old\n",
        stable_tag
    )
}
