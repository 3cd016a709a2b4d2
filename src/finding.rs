//! Reportable events produced by a scan

use serde::Serialize;
use std::fmt;

/// What a finding reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    /// Target runs WordPress
    PlatformDetected,
    /// Installed component matches an advisory
    ComponentVulnerable,
    /// Installed component matches none of its advisories
    ComponentClean,
    /// Credential or token found in a response body
    SecretExposed,
    /// Sensitive file reachable on the target
    FileExposed,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PlatformDetected => "platform-detected",
            Self::ComponentVulnerable => "component-vulnerable",
            Self::ComponentClean => "component-clean",
            Self::SecretExposed => "secret-exposed",
            Self::FileExposed => "file-exposed",
        };
        f.write_str(label)
    }
}

/// Installable WordPress component type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Plugin,
    Theme,
}

impl ComponentKind {
    /// Directory under `wp-content/`
    pub fn directory(self) -> &'static str {
        match self {
            Self::Plugin => "plugins",
            Self::Theme => "themes",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plugin => write!(f, "Plugin"),
            Self::Theme => write!(f, "Theme"),
        }
    }
}

/// One reportable event
///
/// `category` is the logical output the sink appends to, e.g. `wordpress` or
/// `plugins/akismet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub category: String,
    /// URL the evidence was found at
    pub target: String,
    /// Component slug, secret name or file label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub detail: String,
}

impl Finding {
    pub fn platform_detected(target: impl Into<String>, version: Option<String>) -> Self {
        let detail = match &version {
            Some(v) => format!("WordPress {}", v),
            None => "WordPress (version unknown)".to_string(),
        };
        Self {
            kind: FindingKind::PlatformDetected,
            category: "wordpress".to_string(),
            target: target.into(),
            subject: None,
            version,
            detail,
        }
    }

    pub fn component_vulnerable(
        component: ComponentKind,
        target: impl Into<String>,
        slug: &str,
        version: &str,
        description: &str,
    ) -> Self {
        Self {
            kind: FindingKind::ComponentVulnerable,
            category: format!("{}/{}", component.directory(), slug),
            target: target.into(),
            subject: Some(slug.to_string()),
            version: Some(version.to_string()),
            detail: description.to_string(),
        }
    }

    pub fn component_clean(
        component: ComponentKind,
        target: impl Into<String>,
        slug: &str,
        version: &str,
    ) -> Self {
        Self {
            kind: FindingKind::ComponentClean,
            category: "clean".to_string(),
            target: target.into(),
            subject: Some(slug.to_string()),
            version: Some(version.to_string()),
            detail: format!("{} {} has no known vulnerabilities", component, slug),
        }
    }

    pub fn secret_exposed(
        category: impl Into<String>,
        target: impl Into<String>,
        name: &str,
        value: &str,
    ) -> Self {
        Self {
            kind: FindingKind::SecretExposed,
            category: category.into(),
            target: target.into(),
            subject: Some(name.to_string()),
            version: None,
            detail: value.to_string(),
        }
    }

    pub fn file_exposed(
        category: impl Into<String>,
        target: impl Into<String>,
        label: &str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: FindingKind::FileExposed,
            category: category.into(),
            target: target.into(),
            subject: Some(label.to_string()),
            version: None,
            detail: detail.into(),
        }
    }

    /// Every category this finding is recorded under
    ///
    /// A platform detection with a known version is also grouped under
    /// `version/<version>`.
    pub fn categories(&self) -> Vec<String> {
        let mut categories = vec![self.category.clone()];
        if self.kind == FindingKind::PlatformDetected
            && let Some(version) = &self.version
        {
            categories.push(format!("version/{}", version));
        }
        categories
    }

    /// Single-line text rendering used by the file sink
    pub fn to_line(&self) -> String {
        match (self.kind, &self.version) {
            (FindingKind::SecretExposed, _) => format!(
                "{}|{}|{}",
                self.subject.as_deref().unwrap_or("-"),
                self.detail,
                self.target
            ),
            (_, Some(version)) => {
                format!("{} - version: {} - {}", self.target, version, self.detail)
            }
            (_, None) => format!("{} - {}", self.target, self.detail),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.to_line())
    }
}
