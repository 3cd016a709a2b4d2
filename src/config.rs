//! Run configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then a
//! `.env` file, then environment variables, then command-line flags (applied
//! by the binary).
//!
//! # Example Configuration
//!
//! ```toml
//! concurrency = 200
//! timeout_secs = 8
//! database_dir = "database"
//! output_dir = "results"
//! output_format = "json"
//!
//! [checks]
//! shells = false
//! env = true
//! ```

use crate::error::{Error, Result};
use crate::sink::SinkFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of domains scanned at once
pub const DEFAULT_CONCURRENCY: usize = 400;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of domains processed simultaneously.
    ///
    /// Default: 400
    pub concurrency: usize,

    /// Per-request timeout in seconds.
    ///
    /// Default: 5
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates.
    ///
    /// Default: true
    pub accept_invalid_certs: bool,

    /// User agent sent with every request.
    pub user_agent: String,

    /// Directory holding catalogs and path lists.
    ///
    /// Default: `database`
    pub database_dir: PathBuf,

    /// Directory findings are appended to.
    ///
    /// Default: `results`
    pub output_dir: PathBuf,

    /// Line format of finding files.
    ///
    /// Valid values: "text", "json"
    pub output_format: SinkFormat,

    /// Log progress every N domains (and every N components during an audit).
    ///
    /// Default: 100
    pub progress_every: usize,

    /// Which checks run.
    pub checks: ChecksConfig,
}

/// Toggles for the individual checks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    pub plugins: bool,
    pub themes: bool,
    pub timthumbs: bool,
    /// Exposed `wp-config.php` backups
    pub backups: bool,
    /// Web shells and mailers
    pub shells: bool,
    /// Exposed `.env` files on non-WordPress hosts
    pub env: bool,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            plugins: true,
            themes: true,
            timthumbs: true,
            backups: true,
            shells: true,
            env: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: crate::http::TIMEOUT_SECS,
            accept_invalid_certs: true,
            user_agent: crate::http::USER_AGENT.to_string(),
            database_dir: PathBuf::from("database"),
            output_dir: PathBuf::from("results"),
            output_format: SinkFormat::Text,
            progress_every: 100,
            checks: ChecksConfig::default(),
        }
    }
}

impl Config {
    /// Load a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(std::env::vars())
    }

    /// Apply overrides from a dotenv file
    ///
    /// Returns `false` when the file does not exist.
    pub fn apply_env_file(&mut self, path: &Path) -> Result<bool> {
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => return Ok(false),
            Err(e) => return Err(Error::Config(format!("{}: {}", path.display(), e))),
        };
        let vars = iter
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        self.apply_env_from(vars)?;
        Ok(true)
    }

    /// Apply overrides from `(name, value)` pairs
    ///
    /// Recognized: `CONCURRENCY_LIMIT`, `TEST_PLUGINS`, `TEST_THEMES`,
    /// `TEST_SHELLS`, `TEST_ENV`, `TEST_TIMTHUMBS`, `TEST_BACKUPS`. The
    /// `TESTAR_PLUGINS`, `TESTAR_TEMAS`, `TESTAR_SHELLS`, `TESTAR_ENV` and
    /// `TESTAR_TIMTHUMBS` spellings are accepted as aliases.
    pub fn apply_env_from<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            let flag = || value.eq_ignore_ascii_case("true");
            match key.as_ref() {
                "CONCURRENCY_LIMIT" => {
                    self.concurrency = value.parse().map_err(|_| {
                        Error::Config(format!("CONCURRENCY_LIMIT must be a number, got '{}'", value))
                    })?;
                }
                "TEST_PLUGINS" | "TESTAR_PLUGINS" => self.checks.plugins = flag(),
                "TEST_THEMES" | "TESTAR_TEMAS" => self.checks.themes = flag(),
                "TEST_SHELLS" | "TESTAR_SHELLS" => self.checks.shells = flag(),
                "TEST_ENV" | "TESTAR_ENV" => self.checks.env = flag(),
                "TEST_TIMTHUMBS" | "TESTAR_TIMTHUMBS" => self.checks.timthumbs = flag(),
                "TEST_BACKUPS" => self.checks.backups = flag(),
                _ => {}
            }
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be at least 1".to_string()));
        }
        if self.progress_every == 0 {
            return Err(Error::Config("progress_every must be at least 1".to_string()));
        }
        Ok(())
    }
}
