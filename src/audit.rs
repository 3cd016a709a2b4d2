//! Plugin and theme auditing
//!
//! For a confirmed installation every unique slug of a catalog is probed by
//! fetching the component's metadata file (`readme.txt` for plugins,
//! `style.css` for themes). An installed component is compared against each
//! of its advisories; components whose advisory is the TimThumb sentinel are
//! checked by probing their bundled TimThumb scripts instead.

use crate::catalog::{Catalog, Database, THEME_STYLESHEET};
use crate::extract;
use crate::finding::{ComponentKind, Finding};
use crate::http::Fetcher;
use crate::secrets;
use crate::sink::FindingSink;
use reqwest::Method;
use tracing::{debug, info, warn};

/// Slug no real site has installed; a version for it means the host answers
/// every path with content
pub const WILDCARD_PROBE_SLUG: &str = "wp-recon-nonexistent-component";

/// Body markers of a TimThumb script
const TIMTHUMB_MARKERS: &[&str] = &["TimThumb", "define('FILE_CACHE_TIME_BETWEEN_CLEANS'"];
const TIMTHUMB_NO_IMAGE: &str = "no image specified";

/// Category TimThumb hits are written to
const TIMTHUMB_CATEGORY: &str = "timthumbs";

/// Outcome of auditing one catalog against one target
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub kind: ComponentKind,
    /// Findings emitted during the audit, in emission order
    pub findings: Vec<Finding>,
    /// Components with a detected version
    pub installed: usize,
    /// The wildcard guard fired and nothing was audited
    pub aborted: bool,
}

impl AuditReport {
    fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            findings: Vec::new(),
            installed: 0,
            aborted: false,
        }
    }
}

/// Metadata file fetched for one component
#[derive(Debug, Clone)]
struct Probe {
    url: String,
    version: String,
}

/// Check whether a body is a TimThumb script
pub fn is_timthumb(body: &str) -> bool {
    TIMTHUMB_MARKERS.iter().any(|m| body.contains(m))
        || body.to_lowercase().contains(TIMTHUMB_NO_IMAGE)
}

/// Audits installed components of a WordPress target
pub struct ComponentAuditor<'a> {
    fetcher: &'a dyn Fetcher,
    sink: &'a dyn FindingSink,
    database: &'a Database,
    progress_every: usize,
}

impl<'a> ComponentAuditor<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, sink: &'a dyn FindingSink, database: &'a Database) -> Self {
        Self {
            fetcher,
            sink,
            database,
            progress_every: 100,
        }
    }

    /// Log progress every `n` slugs
    pub fn progress_every(mut self, n: usize) -> Self {
        self.progress_every = n.max(1);
        self
    }

    /// URL of a component's metadata file
    pub fn metadata_url(&self, base_url: &str, kind: ComponentKind, slug: &str) -> String {
        let file = match kind {
            ComponentKind::Plugin => self.database.readme_overrides.readme_for(slug),
            ComponentKind::Theme => THEME_STYLESHEET,
        };
        format!("{}/wp-content/{}/{}/{}", base_url, kind.directory(), slug, file)
    }

    /// Audit every slug of `catalog` on the target
    pub async fn audit(&self, base_url: &str, catalog: &Catalog) -> AuditReport {
        let kind = catalog.kind();
        let mut report = AuditReport::new(kind);
        if catalog.is_empty() {
            return report;
        }

        let guard = self.probe(base_url, kind, WILDCARD_PROBE_SLUG).await;
        if !guard.version.is_empty() {
            warn!(
                target_url = %base_url,
                kind = %kind,
                version = %guard.version,
                "host returns component metadata for a nonexistent slug; audit skipped"
            );
            report.aborted = true;
            return report;
        }

        let total = catalog.slugs().len();
        for (index, slug) in catalog.slugs().iter().enumerate() {
            if (index + 1) % self.progress_every == 0 {
                info!(target_url = %base_url, kind = %kind, "checked {}/{}", index + 1, total);
            }

            let probe = self.probe(base_url, kind, slug).await;
            if probe.version.is_empty() {
                continue;
            }
            report.installed += 1;
            self.evaluate(base_url, catalog, slug, &probe, &mut report)
                .await;
        }

        report
    }

    /// Fetch a component's metadata file and extract its version
    async fn probe(&self, base_url: &str, kind: ComponentKind, slug: &str) -> Probe {
        let url = self.metadata_url(base_url, kind, slug);
        let version = match self.fetcher.get_body(&url).await {
            Ok(body) if !extract::looks_like_error_page(&body) => {
                secrets::report(self.sink, &body, &url).await;
                extract::extract(&body)
            }
            Ok(_) => String::new(),
            Err(e) => {
                debug!(url = %url, error = %e, "metadata not found");
                String::new()
            }
        };
        Probe { url, version }
    }

    /// Compare an installed component against all of its advisories
    async fn evaluate(
        &self,
        base_url: &str,
        catalog: &Catalog,
        slug: &str,
        probe: &Probe,
        report: &mut AuditReport,
    ) {
        let kind = catalog.kind();
        let mut flagged = false;

        for signature in catalog.for_slug(slug) {
            if signature.is_timthumb() {
                if self.probe_timthumbs(base_url, kind, slug, report).await > 0 {
                    flagged = true;
                }
            } else if signature
                .comparator
                .matches(&probe.version, &signature.threshold)
            {
                flagged = true;
                self.record(
                    report,
                    Finding::component_vulnerable(
                        kind,
                        &probe.url,
                        slug,
                        &probe.version,
                        &signature.description,
                    ),
                )
                .await;
            }
        }

        if !flagged {
            self.record(
                report,
                Finding::component_clean(kind, &probe.url, slug, &probe.version),
            )
            .await;
        }
    }

    /// Probe the TimThumb scripts shipped with a component; returns the hit count
    async fn probe_timthumbs(
        &self,
        base_url: &str,
        kind: ComponentKind,
        slug: &str,
        report: &mut AuditReport,
    ) -> usize {
        let mut hits = 0;
        for path in self.database.timthumbs_for(kind, slug) {
            let url = format!("{}/{}", base_url, path.trim_start_matches('/'));
            let body = match self.fetcher.fetch(Method::GET, &url).await {
                Ok(response) => response.body,
                Err(e) => {
                    debug!(url = %url, error = %e, "timthumb probe failed");
                    continue;
                }
            };
            if is_timthumb(&body) {
                hits += 1;
                self.record(
                    report,
                    Finding::file_exposed(TIMTHUMB_CATEGORY, &url, slug, "TimThumb script exposed"),
                )
                .await;
            }
        }
        hits
    }

    async fn record(&self, report: &mut AuditReport, finding: Finding) {
        report.findings.push(finding.clone());
        self.sink.emit(finding).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ComponentSignature;

    #[test]
    fn timthumb_markers() {
        assert!(is_timthumb("A TimThumb error has occured"));
        assert!(is_timthumb("<h1>No image specified</h1>"));
        assert!(is_timthumb("define('FILE_CACHE_TIME_BETWEEN_CLEANS', 86400);"));
        assert!(!is_timthumb("<html>404</html>"));
    }

    #[test]
    fn metadata_urls() {
        let mut database = Database::default();
        database.readme_overrides.insert("contact-form-7", "readme.md");
        let sink = crate::sink::MemorySink::new();
        let fetcher = crate::http::HttpFetcher::new().unwrap();
        let auditor = ComponentAuditor::new(&fetcher, &sink, &database);

        assert_eq!(
            auditor.metadata_url("https://a.test", ComponentKind::Plugin, "akismet"),
            "https://a.test/wp-content/plugins/akismet/readme.txt"
        );
        assert_eq!(
            auditor.metadata_url("https://a.test", ComponentKind::Plugin, "contact-form-7"),
            "https://a.test/wp-content/plugins/contact-form-7/readme.md"
        );
        assert_eq!(
            auditor.metadata_url("https://a.test", ComponentKind::Theme, "contact-form-7"),
            "https://a.test/wp-content/themes/contact-form-7/style.css"
        );
    }

    #[test]
    fn empty_catalog_makes_no_requests() {
        let database = Database::default();
        let sink = crate::sink::MemorySink::new();
        let fetcher = crate::http::HttpFetcher::new().unwrap();
        let auditor = ComponentAuditor::new(&fetcher, &sink, &database);
        let catalog = Catalog::new(ComponentKind::Plugin, Vec::<ComponentSignature>::new());

        let report = tokio_test::block_on(auditor.audit("http://0.0.0.0:1", &catalog));
        assert!(report.findings.is_empty());
        assert!(!report.aborted);
    }
}
