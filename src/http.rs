//! HTTP transport
//!
//! Every probe in the engine goes through the [`Fetcher`] trait so that the
//! pipeline can be exercised against in-memory fixtures. [`HttpFetcher`] is
//! the reqwest-backed implementation used by the CLI.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA};
use reqwest::{Client, Method, StatusCode, redirect};
use std::time::Duration;

/// User agent for requests (standard Chrome on Windows)
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Request timeout in seconds
pub const TIMEOUT_SECS: u64 = 5;

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx response
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Counts as a live host: 2xx or 3xx, redirects are not chased
    pub fn is_live(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// Transport used by every probe
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue a single request without following redirects
    ///
    /// Returns the response for any status; only transport failures
    /// (connect, timeout, body read) are errors.
    async fn fetch(&self, method: Method, url: &str) -> Result<FetchResponse>;

    /// GET a URL and return its body, treating any non-2xx status as an error
    async fn get_body(&self, url: &str) -> Result<String> {
        let response = self.fetch(Method::GET, url).await?;
        if !response.is_success() {
            return Err(Error::HttpStatus(response.status));
        }
        Ok(response.body)
    }

    /// Liveness probe: HEAD, falling back to GET when HEAD fails or is refused
    async fn is_live(&self, url: &str) -> bool {
        match self.fetch(Method::HEAD, url).await {
            Ok(response) if !head_refused(response.status) => response.is_live(),
            _ => self
                .fetch(Method::GET, url)
                .await
                .map(|r| r.is_live())
                .unwrap_or(false),
        }
    }
}

fn head_refused(status: u16) -> bool {
    status == StatusCode::METHOD_NOT_ALLOWED.as_u16()
        || status == StatusCode::NOT_IMPLEMENTED.as_u16()
}

/// reqwest-backed [`Fetcher`]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

/// Builder for configuring an HttpFetcher with options
#[derive(Debug)]
pub struct HttpFetcherBuilder {
    timeout: Duration,
    user_agent: String,
    accept_invalid_certs: bool,
}

impl Default for HttpFetcherBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(TIMEOUT_SECS),
            user_agent: USER_AGENT.to_string(),
            accept_invalid_certs: true,
        }
    }
}

impl HttpFetcherBuilder {
    /// Per-request timeout covering connect, headers and body
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Accept self-signed and expired certificates (default: true)
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Build the HttpFetcher with the configured options
    pub fn build(self) -> Result<HttpFetcher> {
        let client = Client::builder()
            .user_agent(self.user_agent)
            .default_headers(browser_headers())
            .timeout(self.timeout)
            .redirect(redirect::Policy::none())
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(HttpFetcher { client })
    }
}

impl HttpFetcher {
    /// Create a fetcher with default settings
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for configuring fetcher options
    pub fn builder() -> HttpFetcherBuilder {
        HttpFetcherBuilder::default()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, method: Method, url: &str) -> Result<FetchResponse> {
        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|e| Error::HttpRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::HttpRequest(e.to_string()))?;

        Ok(FetchResponse { status, body })
    }
}

/// Headers a desktop browser sends on a top-level navigation
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
    headers
}
