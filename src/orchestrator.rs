//! Run orchestration
//!
//! The domain list is read line by line. Each domain becomes one task that
//! walks the pipeline below; a counting semaphore bounds how many tasks are in
//! flight and the reader waits for a permit before spawning the next one.
//!
//! ```text
//! Pending -> Resolving -> Unreachable
//!                      -> Resolved -> Detecting -> NotPlatform
//!                                               -> PlatformConfirmed -> Auditing -> Done
//! ```

use crate::audit::ComponentAuditor;
use crate::catalog::Database;
use crate::checks::ExposureChecker;
use crate::config::Config;
use crate::detect::FingerprintDetector;
use crate::error::{Error, Result};
use crate::finding::{Finding, FindingKind};
use crate::http::Fetcher;
use crate::resolve::ReachabilityResolver;
use crate::sink::FindingSink;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

/// Lifecycle of one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    Pending,
    Resolving,
    Unreachable,
    Resolved,
    Detecting,
    NotPlatform,
    PlatformConfirmed,
    Auditing,
    Done,
}

impl fmt::Display for DomainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Resolving => "resolving",
            Self::Unreachable => "unreachable",
            Self::Resolved => "resolved",
            Self::Detecting => "detecting",
            Self::NotPlatform => "not-platform",
            Self::PlatformConfirmed => "platform-confirmed",
            Self::Auditing => "auditing",
            Self::Done => "done",
        };
        f.write_str(label)
    }
}

/// Terminal result of one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainOutcome {
    Unreachable,
    NotPlatform,
    Confirmed { vulnerable: usize },
}

/// Totals for a whole run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub domains: usize,
    pub unreachable: usize,
    pub not_platform: usize,
    pub confirmed: usize,
    /// `component-vulnerable` findings across all targets
    pub vulnerable_components: usize,
    /// Tasks that panicked
    pub failed: usize,
    pub elapsed_secs: f64,
}

#[derive(Debug, Default)]
struct Counters {
    domains: AtomicUsize,
    unreachable: AtomicUsize,
    not_platform: AtomicUsize,
    confirmed: AtomicUsize,
    vulnerable: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn tally(&self, joined: std::result::Result<DomainOutcome, JoinError>) {
        match joined {
            Ok(DomainOutcome::Unreachable) => {
                self.unreachable.fetch_add(1, Ordering::Relaxed);
            }
            Ok(DomainOutcome::NotPlatform) => {
                self.not_platform.fetch_add(1, Ordering::Relaxed);
            }
            Ok(DomainOutcome::Confirmed { vulnerable }) => {
                self.confirmed.fetch_add(1, Ordering::Relaxed);
                self.vulnerable.fetch_add(vulnerable, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(error = %e, "domain task failed");
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn summary(&self, started: Instant) -> RunSummary {
        RunSummary {
            domains: self.domains.load(Ordering::Relaxed),
            unreachable: self.unreachable.load(Ordering::Relaxed),
            not_platform: self.not_platform.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            vulnerable_components: self.vulnerable.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            elapsed_secs: started.elapsed().as_secs_f64(),
        }
    }
}

/// Everything a domain task needs, cheap to clone into each task
#[derive(Clone)]
struct DomainScan {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn FindingSink>,
    database: Arc<Database>,
    progress_every: usize,
}

impl DomainScan {
    fn transition(domain: &str, state: DomainState) {
        debug!(domain, state = %state, "state change");
    }

    async fn run(&self, domain: &str) -> DomainOutcome {
        let fetcher = self.fetcher.as_ref();
        let sink = self.sink.as_ref();
        let database = self.database.as_ref();

        Self::transition(domain, DomainState::Resolving);
        let Some(target) = ReachabilityResolver::new(fetcher).resolve(domain).await else {
            Self::transition(domain, DomainState::Unreachable);
            return DomainOutcome::Unreachable;
        };
        Self::transition(domain, DomainState::Resolved);

        let checker = ExposureChecker::new(fetcher, sink, database).progress_every(self.progress_every);

        Self::transition(domain, DomainState::Detecting);
        let Some(detection) = FingerprintDetector::new(fetcher, sink)
            .detect(&target.base_url)
            .await
        else {
            Self::transition(domain, DomainState::NotPlatform);
            checker.env_files(&target.base_url).await;
            return DomainOutcome::NotPlatform;
        };
        Self::transition(domain, DomainState::PlatformConfirmed);
        sink.emit(Finding::platform_detected(&detection.url, detection.version.clone()))
            .await;

        Self::transition(domain, DomainState::Auditing);
        let auditor = ComponentAuditor::new(fetcher, sink, database).progress_every(self.progress_every);
        checker.config_backups(&detection.url).await;
        let mut vulnerable = 0;
        for catalog in [&database.plugins, &database.themes] {
            let report = auditor.audit(&detection.url, catalog).await;
            vulnerable += report
                .findings
                .iter()
                .filter(|f| f.kind == FindingKind::ComponentVulnerable)
                .count();
        }
        checker.shells(&detection.url).await;

        Self::transition(domain, DomainState::Done);
        DomainOutcome::Confirmed { vulnerable }
    }
}

/// Drives a full run over a domain list
pub struct ScanOrchestrator {
    scan: DomainScan,
    concurrency: usize,
}

impl ScanOrchestrator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn FindingSink>,
        database: Arc<Database>,
        config: &Config,
    ) -> Self {
        Self {
            scan: DomainScan {
                fetcher,
                sink,
                database,
                progress_every: config.progress_every.max(1),
            },
            concurrency: config.concurrency.max(1),
        }
    }

    /// Scan a single domain; used by [`run`](Self::run) for every list entry
    pub async fn scan_domain(&self, domain: &str) -> DomainOutcome {
        self.scan.run(domain).await
    }

    /// Scan every domain in the list and wait for all of them
    ///
    /// Fails only when the list cannot be opened.
    pub async fn run(&self, domain_list: &Path) -> Result<RunSummary> {
        let started = Instant::now();
        let file = File::open(domain_list).await.map_err(|source| Error::DomainList {
            path: domain_list.to_path_buf(),
            source,
        })?;
        let mut lines = BufReader::new(file).lines();

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let counters = Counters::default();
        let mut tasks = JoinSet::new();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %domain_list.display(), error = %e, "stopped reading domain list");
                    break;
                }
            };
            let domain = line.trim();
            if domain.is_empty() || domain.starts_with('#') {
                continue;
            }

            let read = counters.domains.fetch_add(1, Ordering::Relaxed) + 1;
            if read % self.scan.progress_every == 0 {
                info!("domains read: {}", read);
            }

            DomainScan::transition(domain, DomainState::Pending);
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let scan = self.scan.clone();
            let domain = domain.to_string();
            tasks.spawn(async move {
                let outcome = scan.run(&domain).await;
                drop(permit);
                outcome
            });

            while let Some(joined) = tasks.try_join_next() {
                counters.tally(joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            counters.tally(joined);
        }

        let summary = counters.summary(started);
        info!(
            domains = summary.domains,
            confirmed = summary.confirmed,
            unreachable = summary.unreachable,
            "run finished"
        );
        Ok(summary)
    }
}
