//! Signature catalogs and path lists
//!
//! Everything here is loaded once at start-up and is read-only afterwards.
//! A file that is missing or unreadable degrades to an empty list so the
//! corresponding check is simply skipped.
//!
//! Catalog records look like `akismet|<=4.2.1|XSS`; a bare `all` in the
//! middle field marks every detected version as affected.

use crate::config::Config;
use crate::finding::ComponentKind;
use crate::version::Comparator;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Description marking a component that is checked by probing TimThumb scripts
pub const TIMTHUMB_MARKER: &str = "Timthumb";

/// Default metadata file for plugins
pub const DEFAULT_PLUGIN_README: &str = "readme.txt";

/// Metadata file for themes
pub const THEME_STYLESHEET: &str = "style.css";

/// File names inside the database directory
pub mod files {
    pub const PLUGINS: &str = "plugins.txt";
    pub const THEMES: &str = "themes.txt";
    pub const TIMTHUMBS: &str = "timthumbs-v3.txt";
    pub const CONFIG_BACKUPS: &str = "config_backups.txt";
    pub const SHELLS: &str = "shells.txt";
    pub const ENVS: &str = "envs.txt";
    pub const DYNAMIC_FINDERS: &str = "dynamic_finders.yml";
}

/// One advisory for a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSignature {
    pub slug: String,
    pub comparator: Comparator,
    pub threshold: String,
    pub description: String,
}

impl ComponentSignature {
    /// Parse a `slug|comparator+version|description` record
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.trim().splitn(3, '|');
        let slug = parts.next()?.trim();
        let constraint = parts.next()?;
        let description = parts.next()?.trim();
        if slug.is_empty() {
            return None;
        }

        let (comparator, threshold) = parse_constraint(constraint);
        Some(Self {
            slug: slug.to_string(),
            comparator,
            threshold,
            description: description.to_string(),
        })
    }

    /// Sentinel entry that needs TimThumb probing instead of a version check
    pub fn is_timthumb(&self) -> bool {
        self.description == TIMTHUMB_MARKER
    }

    fn timthumb(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            comparator: Comparator::All,
            threshold: "0".to_string(),
            description: TIMTHUMB_MARKER.to_string(),
        }
    }
}

/// Split `<= 1.5.6` into its comparator and version
///
/// A version without a comparator means equality.
fn parse_constraint(raw: &str) -> (Comparator, String) {
    let raw = raw.trim();
    if raw == "all" {
        return (Comparator::All, "0".to_string());
    }
    for (prefix, comparator) in [
        ("<=", Comparator::LessOrEqual),
        (">=", Comparator::GreaterOrEqual),
        ("<", Comparator::Less),
        (">", Comparator::Greater),
        ("=", Comparator::Equal),
    ] {
        if let Some(version) = raw.strip_prefix(prefix) {
            return (comparator, version.trim().to_string());
        }
    }
    (Comparator::Equal, raw.to_string())
}

/// Advisories for one component type
#[derive(Debug, Clone)]
pub struct Catalog {
    kind: ComponentKind,
    signatures: Vec<ComponentSignature>,
    slugs: Vec<String>,
}

impl Catalog {
    pub fn new(kind: ComponentKind, signatures: Vec<ComponentSignature>) -> Self {
        let slugs = {
            let mut seen = HashSet::new();
            signatures
                .iter()
                .filter(|s| seen.insert(s.slug.as_str()))
                .map(|s| s.slug.clone())
                .collect()
        };

        Self {
            kind,
            signatures,
            slugs,
        }
    }

    pub fn empty(kind: ComponentKind) -> Self {
        Self::new(kind, Vec::new())
    }

    /// Load a catalog file, returning an empty catalog when it cannot be read
    pub fn load(kind: ComponentKind, path: &Path) -> Self {
        let signatures = read_lines(path)
            .iter()
            .filter_map(|line| {
                let parsed = ComponentSignature::parse(line);
                if parsed.is_none() {
                    debug!(path = %path.display(), line = %line, "skipping malformed catalog record");
                }
                parsed
            })
            .collect();
        Self::new(kind, signatures)
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn signatures(&self) -> &[ComponentSignature] {
        &self.signatures
    }

    /// Unique slugs in first-seen order; one probe per slug
    pub fn slugs(&self) -> &[String] {
        &self.slugs
    }

    /// Every advisory for a slug
    pub fn for_slug<'a>(&'a self, slug: &'a str) -> impl Iterator<Item = &'a ComponentSignature> {
        self.signatures.iter().filter(move |s| s.slug == slug)
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Add a TimThumb sentinel for every component that ships a TimThumb path
    pub fn merge_timthumbs(&mut self, timthumb_paths: &[String]) {
        let mut added = Vec::new();
        for path in timthumb_paths {
            let Some(slug) = component_slug(path, self.kind) else {
                continue;
            };
            let exists = self
                .signatures
                .iter()
                .chain(added.iter())
                .any(|s| s.slug == slug && s.is_timthumb());
            if !exists {
                added.push(ComponentSignature::timthumb(slug));
            }
        }
        if !added.is_empty() {
            let mut signatures = std::mem::take(&mut self.signatures);
            signatures.extend(added);
            *self = Self::new(self.kind, signatures);
        }
    }
}

/// Slug of the component a `wp-content/<plugins|themes>/<slug>/...` path belongs to
pub fn component_slug(path: &str, kind: ComponentKind) -> Option<&str> {
    let marker = format!("wp-content/{}/", kind.directory());
    let start = path.find(&marker)? + marker.len();
    path[start..].split('/').next().filter(|s| !s.is_empty())
}

/// Read a newline separated list, skipping blanks and `#` comments
pub fn load_path_list(path: &Path) -> Vec<String> {
    read_lines(path)
}

fn read_lines(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(content) => parse_lines(&content),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "list not loaded; related checks are skipped");
            Vec::new()
        }
    }
}

fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Per-plugin override of the metadata file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadmeOverride {
    pub path: String,
}

/// Typed view of `dynamic_finders.yml`
#[derive(Debug, Clone, Default)]
pub struct ReadmeOverrides {
    entries: HashMap<String, ReadmeOverride>,
}

#[derive(Debug, Default, Deserialize)]
struct DynamicFinders {
    #[serde(default)]
    plugins: HashMap<String, Option<FinderEntry>>,
}

#[derive(Debug, Default, Deserialize)]
struct FinderEntry {
    #[serde(rename = "Readme", default)]
    readme: Option<ReadmeFinder>,
}

#[derive(Debug, Deserialize)]
struct ReadmeFinder {
    #[serde(default)]
    path: Option<ReadmePath>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReadmePath {
    One(String),
    Many(Vec<String>),
}

impl ReadmeOverrides {
    /// Parse the YAML document; malformed input yields no overrides
    pub fn from_yaml(content: &str) -> Self {
        let finders: DynamicFinders = match serde_yaml::from_str(content) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "dynamic finders not parsed; using default readme names");
                return Self::default();
            }
        };

        let entries = finders
            .plugins
            .into_iter()
            .filter_map(|(slug, entry)| {
                let path = match entry?.readme?.path? {
                    ReadmePath::One(p) => p,
                    ReadmePath::Many(paths) => paths.into_iter().next()?,
                };
                Some((slug, ReadmeOverride { path }))
            })
            .collect();

        Self { entries }
    }

    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_yaml(&content),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no readme overrides");
                Self::default()
            }
        }
    }

    pub fn insert(&mut self, slug: impl Into<String>, path: impl Into<String>) {
        self.entries
            .insert(slug.into(), ReadmeOverride { path: path.into() });
    }

    /// Metadata file for a plugin slug
    pub fn readme_for(&self, slug: &str) -> &str {
        self.entries
            .get(slug)
            .map(|o| o.path.as_str())
            .unwrap_or(DEFAULT_PLUGIN_README)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything the engine reads from the database directory
#[derive(Debug, Clone)]
pub struct Database {
    pub plugins: Catalog,
    pub themes: Catalog,
    pub timthumb_paths: Vec<String>,
    pub config_backups: Vec<String>,
    pub shells: Vec<String>,
    pub env_paths: Vec<String>,
    pub readme_overrides: ReadmeOverrides,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            plugins: Catalog::empty(ComponentKind::Plugin),
            themes: Catalog::empty(ComponentKind::Theme),
            timthumb_paths: Vec::new(),
            config_backups: Vec::new(),
            shells: Vec::new(),
            env_paths: Vec::new(),
            readme_overrides: ReadmeOverrides::default(),
        }
    }
}

impl Database {
    /// Load the lists enabled in the configuration
    pub fn load(config: &Config) -> Self {
        let dir = &config.database_dir;
        let checks = &config.checks;
        let list = |enabled: bool, name: &str| {
            if enabled {
                load_path_list(&dir.join(name))
            } else {
                Vec::new()
            }
        };

        let timthumb_paths = list(checks.timthumbs, files::TIMTHUMBS);

        let mut plugins = if checks.plugins {
            Catalog::load(ComponentKind::Plugin, &dir.join(files::PLUGINS))
        } else {
            Catalog::empty(ComponentKind::Plugin)
        };
        let mut themes = if checks.themes {
            Catalog::load(ComponentKind::Theme, &dir.join(files::THEMES))
        } else {
            Catalog::empty(ComponentKind::Theme)
        };
        if checks.plugins {
            plugins.merge_timthumbs(&timthumb_paths);
        }
        if checks.themes {
            themes.merge_timthumbs(&timthumb_paths);
        }

        Self {
            plugins,
            themes,
            timthumb_paths,
            config_backups: list(checks.backups, files::CONFIG_BACKUPS),
            shells: list(checks.shells, files::SHELLS),
            env_paths: list(checks.env, files::ENVS),
            readme_overrides: ReadmeOverrides::load(&dir.join(files::DYNAMIC_FINDERS)),
        }
    }

    /// TimThumb script paths belonging to one component
    pub fn timthumbs_for<'a>(
        &'a self,
        kind: ComponentKind,
        slug: &'a str,
    ) -> impl Iterator<Item = &'a String> {
        self.timthumb_paths
            .iter()
            .filter(move |p| component_slug(p, kind) == Some(slug))
    }
}
