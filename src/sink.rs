//! Finding sinks
//!
//! A sink receives every [`Finding`] the engine produces. [`FileSink`] appends
//! one line per finding to `<output_dir>/<category>.txt`; writes to the same
//! file are serialized while different files are written concurrently.

use crate::error::{Error, Result};
use crate::finding::{Finding, FindingKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Destination for findings
#[async_trait]
pub trait FindingSink: Send + Sync {
    /// Record a finding; failures are logged, never propagated into the scan
    async fn emit(&self, finding: Finding);
}

/// Line format used by [`FileSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    /// `target - version: x - detail`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for SinkFormat {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(Error::Config(format!(
                "invalid output format: '{}' (valid: text, json)",
                s
            ))),
        }
    }
}

/// Append-only sink writing one file per category
#[derive(Debug)]
pub struct FileSink {
    root: PathBuf,
    format: SinkFormat,
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>, format: SinkFormat) -> Self {
        Self {
            root: root.into(),
            format,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Output root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a category is written to
    pub fn path_for(&self, category: &str) -> PathBuf {
        let mut path = self.root.clone();
        let segments: Vec<String> = category
            .split('/')
            .filter(|s| !s.is_empty())
            .map(sanitize_segment)
            .collect();

        match segments.split_last() {
            Some((file, dirs)) => {
                path.extend(dirs);
                path.push(format!("{}.txt", file));
            }
            None => path.push("findings.txt"),
        }
        path
    }

    fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    fn render(&self, finding: &Finding) -> Result<String> {
        match self.format {
            SinkFormat::Text => Ok(finding.to_line()),
            SinkFormat::Json => Ok(serde_json::to_string(finding)?),
        }
    }

    async fn append(&self, finding: &Finding) -> Result<()> {
        let mut line = self.render(finding)?;
        line.push('\n');
        for category in finding.categories() {
            self.append_line(&self.path_for(&category), &line).await?;
        }
        Ok(())
    }

    async fn append_line(&self, path: &Path, line: &str) -> Result<()> {
        let lock = self.lock_for(path);
        let _guard = lock.lock().await;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(Error::OutputFailed)?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(Error::OutputFailed)?;
        file.write_all(line.as_bytes())
            .await
            .map_err(Error::OutputFailed)?;
        file.flush().await.map_err(Error::OutputFailed)
    }
}

#[async_trait]
impl FindingSink for FileSink {
    async fn emit(&self, finding: Finding) {
        announce(&finding);
        if let Err(e) = self.append(&finding).await {
            warn!(category = %finding.category, error = %e, "failed to record finding");
        }
    }
}

/// Log a finding for the operator
pub fn announce(finding: &Finding) {
    match finding.kind {
        FindingKind::PlatformDetected | FindingKind::ComponentClean => {
            info!(kind = %finding.kind, "{}", finding.to_line())
        }
        _ => warn!(kind = %finding.kind, "{}", finding.to_line()),
    }
}

/// Keep a single path segment inside the output directory
fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Sink that keeps findings in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    findings: Mutex<Vec<Finding>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn findings(&self) -> Vec<Finding> {
        self.findings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn of_kind(&self, kind: FindingKind) -> Vec<Finding> {
        self.findings()
            .into_iter()
            .filter(|f| f.kind == kind)
            .collect()
    }
}

#[async_trait]
impl FindingSink for MemorySink {
    async fn emit(&self, finding: Finding) {
        self.findings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(finding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::ComponentKind;

    #[test]
    fn category_maps_to_nested_file() {
        let sink = FileSink::new("/out", SinkFormat::Text);
        assert_eq!(
            sink.path_for("plugins/akismet"),
            PathBuf::from("/out/plugins/akismet.txt")
        );
        assert_eq!(sink.path_for("tokens"), PathBuf::from("/out/tokens.txt"));
    }

    #[test]
    fn category_cannot_escape_root() {
        let sink = FileSink::new("/out", SinkFormat::Text);
        assert_eq!(
            sink.path_for("plugins/../../etc"),
            PathBuf::from("/out/plugins/_/_/etc.txt")
        );
        assert_eq!(sink.path_for(""), PathBuf::from("/out/findings.txt"));
    }

    #[test]
    fn parse_sink_format() {
        assert_eq!("JSON".parse::<SinkFormat>().unwrap(), SinkFormat::Json);
        assert!("xml".parse::<SinkFormat>().is_err());
    }

    #[tokio::test]
    async fn file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), SinkFormat::Text);

        for version in ["4.1.0", "4.0.0"] {
            sink.emit(Finding::component_vulnerable(
                ComponentKind::Plugin,
                "https://a.test/wp-content/plugins/akismet/readme.txt",
                "akismet",
                version,
                "XSS",
            ))
            .await;
        }

        let written = std::fs::read_to_string(dir.path().join("plugins/akismet.txt")).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.contains("version: 4.0.0 - XSS"));
    }

    #[tokio::test]
    async fn file_sink_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), SinkFormat::Json);
        sink.emit(Finding::platform_detected("https://a.test", Some("6.4".into())))
            .await;

        let written = std::fs::read_to_string(dir.path().join("wordpress.txt")).unwrap();
        let value: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(value["kind"], "platform-detected");
        assert_eq!(value["version"], "6.4");
    }

    #[tokio::test]
    async fn platform_also_written_to_version_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), SinkFormat::Text);
        sink.emit(Finding::platform_detected("https://a.test", Some("5.4".into())))
            .await;
        sink.emit(Finding::platform_detected("https://b.test", None))
            .await;

        let all = std::fs::read_to_string(dir.path().join("wordpress.txt")).unwrap();
        assert_eq!(all.lines().count(), 2);
        let grouped = std::fs::read_to_string(dir.path().join("version/5.4.txt")).unwrap();
        assert_eq!(grouped, "https://a.test - version: 5.4 - WordPress 5.4\n");
    }

    #[tokio::test]
    async fn concurrent_writers_to_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(FileSink::new(dir.path(), SinkFormat::Text));

        let mut handles = Vec::new();
        for i in 0..50 {
            let sink = Arc::clone(&sink);
            handles.push(tokio::spawn(async move {
                sink.emit(Finding::secret_exposed(
                    "tokens",
                    format!("https://host{}.test", i),
                    "AWS",
                    "AKIA0000000000000000",
                ))
                .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let written = std::fs::read_to_string(dir.path().join("tokens.txt")).unwrap();
        assert_eq!(written.lines().count(), 50);
        assert!(written.lines().all(|l| l.starts_with("AWS|AKIA")));
    }
}
