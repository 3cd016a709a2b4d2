//! Exposed file checks
//!
//! Three list-driven probes run alongside the component audit:
//! `wp-config.php` backups and web shells on confirmed WordPress targets, and
//! `.env` files on hosts that are reachable but not WordPress.

use crate::catalog::Database;
use crate::finding::Finding;
use crate::http::Fetcher;
use crate::secrets;
use crate::sink::FindingSink;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

/// Output categories
pub mod categories {
    pub const CONFIGS: &str = "configs";
    pub const MYSQL: &str = "mysqlconfigs";
    pub const SMTP: &str = "smtpconfigs";
    pub const SHELL_MAILERS: &str = "shellmails";
    pub const SHELL_UPLOADS: &str = "shellupload";
    pub const ENV: &str = "env-production";
}

static DB_DEFINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"define\(\s*['"](DB_HOST|DB_USER|DB_PASSWORD|DB_NAME)['"]\s*,\s*['"]([^'"]+)['"]\s*\)"#,
    )
    .expect("define regex")
});

/// Keys whose presence marks a body as an environment file
const ENV_KEYS: &[&str] = &[
    "app_name=",
    "app_key=",
    "app_secret=",
    "api=",
    "key=",
    "password=",
    "senha=",
    "smtp=",
    "smtp_host=",
    "smtp_user=",
    "smtp_username=",
    "mail_host=",
    "mail_user=",
    "mail_username=",
    "db_name=",
    "db_user=",
    "db_pass=",
    "db_host=",
];

const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1"];

/// Join a base URL and a list entry with exactly one slash
fn join(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Host part of a URL, empty when it has none
fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Replace loopback database hosts with the scanned host
fn localize(db_host: &str, host: &str) -> String {
    LOCAL_HOSTS
        .iter()
        .fold(db_host.to_string(), |acc, local| acc.replace(local, host))
}

/// `DB_*` constants defined in a `wp-config.php` body
pub fn db_defines(body: &str) -> BTreeMap<String, String> {
    DB_DEFINE_RE
        .captures_iter(body)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Whether a fetched body looks like an environment file rather than a page
pub fn looks_like_env(body: &str) -> bool {
    let lower = body.to_lowercase();
    if lower.contains("<html") || lower.contains("<!doctype html") {
        return false;
    }
    ENV_KEYS.iter().any(|key| lower.contains(key))
}

/// `KEY=VALUE` pairs of an environment file; quotes around values are dropped
pub fn parse_env(body: &str) -> HashMap<String, String> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// An entry of the shell list: `path` or `path|marker`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellEntry {
    pub path: String,
    pub marker: Option<String>,
}

impl ShellEntry {
    pub fn parse(line: &str) -> Self {
        match line.split_once('|') {
            Some((path, marker)) => Self {
                path: path.trim().to_string(),
                marker: Some(marker.trim().to_lowercase()).filter(|m| !m.is_empty()),
            },
            None => Self {
                path: line.trim().to_string(),
                marker: None,
            },
        }
    }

    /// Output category when `body` is a shell, `None` otherwise
    pub fn classify(&self, body: &str) -> Option<&'static str> {
        let lower = body.to_lowercase();
        if lower.contains("leafmailer") || lower.contains("phpmailer") {
            Some(categories::SHELL_MAILERS)
        } else if lower.contains(r#" type="file""#) && lower.contains(r#" type="submit""#) {
            Some(categories::SHELL_UPLOADS)
        } else if self.marker.as_deref().is_some_and(|m| lower.contains(m)) {
            Some(categories::SHELL_UPLOADS)
        } else {
            None
        }
    }
}

/// Database credentials found in an environment file
fn env_mysql(values: &HashMap<String, String>, host: &str) -> Option<String> {
    let get = |k: &str| values.get(k).map(String::as_str).unwrap_or_default();
    let db_host = get("DB_HOST");
    if db_host.is_empty() || db_host == "null" {
        return None;
    }
    let credentials = ["DB_USERNAME", "DB_PASSWORD", "DB_DATABASE", "DB_USER", "DB_PASS"];
    if credentials.iter().any(|k| get(k) == "null") {
        return None;
    }
    Some(format!(
        "HOST:{} USERNAME:{}{} PASSWORD:{}{} DATABASE:{}",
        localize(db_host, host),
        get("DB_USERNAME"),
        get("DB_USER"),
        get("DB_PASSWORD"),
        get("DB_PASS"),
        get("DB_DATABASE"),
    ))
}

/// Mail credentials found in an environment file
fn env_smtp(values: &HashMap<String, String>) -> Option<String> {
    let get = |k: &str| values.get(k).map(String::as_str).unwrap_or_default();
    let mail_host = get("MAIL_HOST");
    if mail_host.is_empty()
        || LOCAL_HOSTS.iter().any(|local| mail_host.starts_with(local))
    {
        return None;
    }
    if ["MAIL_USERNAME", "MAIL_PASSWORD", "MAIL_USER"]
        .iter()
        .any(|k| get(k) == "null")
    {
        return None;
    }
    Some(format!(
        "MAIL_HOST:{} MAIL_USERNAME:{}{} MAIL_PASSWORD:{}{}",
        mail_host,
        get("MAIL_USERNAME"),
        get("MAIL_USER"),
        get("MAIL_PASS"),
        get("MAIL_PASSWORD"),
    ))
}

/// Runs the list-driven file checks against one target
pub struct ExposureChecker<'a> {
    fetcher: &'a dyn Fetcher,
    sink: &'a dyn FindingSink,
    database: &'a Database,
    progress_every: usize,
}

impl<'a> ExposureChecker<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, sink: &'a dyn FindingSink, database: &'a Database) -> Self {
        Self {
            fetcher,
            sink,
            database,
            progress_every: 100,
        }
    }

    pub fn progress_every(mut self, n: usize) -> Self {
        self.progress_every = n.max(1);
        self
    }

    /// Fetch a 2xx body and scan it for secrets
    async fn fetch_scanned(&self, url: &str) -> Option<String> {
        match self.fetcher.get_body(url).await {
            Ok(body) => {
                secrets::report(self.sink, &body, url).await;
                Some(body)
            }
            Err(e) => {
                debug!(url = %url, error = %e, "not exposed");
                None
            }
        }
    }

    fn progress(&self, check: &str, base_url: &str, done: usize, total: usize) {
        if done % self.progress_every == 0 {
            info!(target_url = %base_url, check, "checked {}/{}", done, total);
        }
    }

    async fn record(&self, findings: &mut Vec<Finding>, finding: Finding) {
        findings.push(finding.clone());
        self.sink.emit(finding).await;
    }

    /// Look for readable `wp-config.php` backups
    pub async fn config_backups(&self, base_url: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        let host = host_of(base_url);
        let total = self.database.config_backups.len();

        for (index, path) in self.database.config_backups.iter().enumerate() {
            self.progress("backups", base_url, index + 1, total);
            let url = join(base_url, path);
            let Some(body) = self.fetch_scanned(&url).await else {
                continue;
            };

            if body.contains("DB_NAME") {
                self.record(
                    &mut findings,
                    Finding::file_exposed(categories::CONFIGS, &url, path, "configuration backup exposed"),
                )
                .await;
            }

            let mut defines = db_defines(&body);
            if defines.is_empty() {
                continue;
            }
            if let Some(db_host) = defines.get_mut("DB_HOST") {
                *db_host = localize(db_host, &host);
            }
            let detail = defines
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v))
                .collect::<Vec<_>>()
                .join(" ");
            self.record(
                &mut findings,
                Finding::file_exposed(categories::MYSQL, &url, "wp-config", detail),
            )
            .await;
        }

        findings
    }

    /// Look for web shells and mailers; stops at the first hit
    pub async fn shells(&self, base_url: &str) -> Vec<Finding> {
        let mut findings = Vec::new();

        for line in &self.database.shells {
            let entry = ShellEntry::parse(line);
            if entry.path.is_empty() {
                continue;
            }
            let url = join(base_url, &entry.path);
            let Some(body) = self.fetch_scanned(&url).await else {
                continue;
            };

            if let Some(category) = entry.classify(&body) {
                self.record(
                    &mut findings,
                    Finding::file_exposed(category, &url, &entry.path, "web shell exposed"),
                )
                .await;
                break;
            }
        }

        findings
    }

    /// Look for readable environment files
    pub async fn env_files(&self, base_url: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        let total = self.database.env_paths.len();

        for (index, path) in self.database.env_paths.iter().enumerate() {
            self.progress("env", base_url, index + 1, total);
            let url = join(base_url, path);
            let Some(body) = self.fetch_scanned(&url).await else {
                continue;
            };
            if !looks_like_env(&body) {
                continue;
            }

            self.record(
                &mut findings,
                Finding::file_exposed(categories::ENV, &url, path, "environment file exposed"),
            )
            .await;

            let values = parse_env(&body);
            if let Some(detail) = env_mysql(&values, &host_of(&url)) {
                self.record(
                    &mut findings,
                    Finding::file_exposed(categories::MYSQL, &url, ".env", detail),
                )
                .await;
            }
            if let Some(detail) = env_smtp(&values) {
                self.record(
                    &mut findings,
                    Finding::file_exposed(categories::SMTP, &url, ".env", detail),
                )
                .await;
            }
        }

        findings
    }
}
