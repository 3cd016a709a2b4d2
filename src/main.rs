//! wp-recon CLI - scan a list of domains for WordPress installations

use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

use wp_recon::{
    CatalogOverview, Config, Database, FileSink, HttpFetcher, ScanOrchestrator, SinkFormat,
    output::{OutputFormat, output_overview, output_summary},
};

/// Concurrent WordPress reconnaissance - detects sites, audits plugins and themes
#[derive(Parser, Debug)]
#[command(name = "wp-recon")]
#[command(version, about, long_about = None)]
struct Args {
    /// File with one domain per line
    #[arg(default_value = "domains.txt")]
    domains: PathBuf,

    /// TOML configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Directory holding catalogs and path lists
    #[arg(long = "database")]
    database: Option<PathBuf>,

    /// Directory findings are written to
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Maximum number of domains scanned at once
    #[arg(short = 'j', long = "concurrency")]
    concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(short = 't', long = "timeout")]
    timeout: Option<u64>,

    /// Line format of finding files
    #[arg(long = "format", value_enum)]
    format: Option<SinkFormatArg>,

    /// Console output for the catalog overview and run summary
    #[arg(long = "summary", default_value = "human", value_enum)]
    summary: OutputFormatArg,

    /// Debug logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

/// Finding file format argument
#[derive(Clone, Copy, Debug, ValueEnum)]
enum SinkFormatArg {
    Text,
    Json,
}

impl From<SinkFormatArg> for SinkFormat {
    fn from(arg: SinkFormatArg) -> Self {
        match arg {
            SinkFormatArg::Text => SinkFormat::Text,
            SinkFormatArg::Json => SinkFormat::Json,
        }
    }
}

/// Console output format argument
#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormatArg {
    Human,
    Json,
    None,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::None => OutputFormat::None,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(args.verbose, rust_log.as_deref()))
        .with_target(false)
        .init();

    if matches!(args.summary, OutputFormatArg::Human) {
        print_banner();
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` when set, otherwise info (debug with `--verbose`)
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(if verbose { "debug" } else { "info" }),
    }
}

/// Layer defaults, config file, `.env`, environment and flags
fn load_config(args: &Args) -> wp_recon::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env_file(Path::new(".env"))?;
    config.apply_env()?;

    if let Some(dir) = &args.database {
        config.database_dir = dir.clone();
    }
    if let Some(dir) = &args.output {
        config.output_dir = dir.clone();
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
    if let Some(secs) = args.timeout {
        config.timeout_secs = secs;
    }
    if let Some(format) = args.format {
        config.output_format = format.into();
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: &Args) -> wp_recon::Result<()> {
    let config = load_config(args)?;
    let summary_format: OutputFormat = args.summary.into();

    let database = Arc::new(Database::load(&config));
    let stdout = std::io::stdout();
    output_overview(
        &CatalogOverview::from(database.as_ref()),
        summary_format,
        &mut stdout.lock(),
    )?;

    let fetcher = HttpFetcher::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .accept_invalid_certs(config.accept_invalid_certs)
        .build()?;
    let sink = FileSink::new(config.output_dir.clone(), config.output_format);

    let orchestrator =
        ScanOrchestrator::new(Arc::new(fetcher), Arc::new(sink), database, &config);
    let summary = orchestrator.run(&args.domains).await?;

    output_summary(&summary, summary_format, &mut stdout.lock())
}

fn print_banner() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    println!("wp-recon v{}", VERSION);
    println!();
}
