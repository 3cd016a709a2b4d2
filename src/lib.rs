//! wp-recon - concurrent WordPress reconnaissance
//!
//! Reads a list of domains, finds the live URL variant of each, confirms which
//! ones run WordPress and audits their plugins and themes against a
//! vulnerability catalog. Exposed configuration backups, shells, `.env` files
//! and leaked credentials are reported along the way.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use wp_recon::{Config, Database, HttpFetcher, MemorySink, ScanOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> wp_recon::Result<()> {
//!     let config = Config::default();
//!     let database = Arc::new(Database::load(&config));
//!     let sink = Arc::new(MemorySink::new());
//!     let fetcher = Arc::new(HttpFetcher::new()?);
//!
//!     let orchestrator = ScanOrchestrator::new(fetcher, sink.clone(), database, &config);
//!     let summary = orchestrator.run(Path::new("domains.txt")).await?;
//!     println!("{} WordPress sites, {} findings", summary.confirmed, sink.findings().len());
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod catalog;
pub mod checks;
pub mod config;
pub mod detect;
pub mod error;
pub mod extract;
pub mod finding;
pub mod http;
pub mod orchestrator;
pub mod output;
pub mod resolve;
pub mod secrets;
pub mod sink;
pub mod version;

pub use audit::{AuditReport, ComponentAuditor};
pub use catalog::{Catalog, ComponentSignature, Database, ReadmeOverrides};
pub use checks::ExposureChecker;
pub use config::{ChecksConfig, Config};
pub use detect::{Detection, FingerprintDetector};
pub use error::{Error, Result};
pub use finding::{ComponentKind, Finding, FindingKind};
pub use http::{FetchResponse, Fetcher, HttpFetcher, HttpFetcherBuilder};
pub use orchestrator::{DomainOutcome, RunSummary, ScanOrchestrator};
pub use output::{CatalogOverview, OutputFormat, output_overview, output_summary};
pub use resolve::{ReachabilityResolver, ResolvedTarget};
pub use sink::{FileSink, FindingSink, MemorySink, SinkFormat};
pub use version::{Comparator, SemVer};
