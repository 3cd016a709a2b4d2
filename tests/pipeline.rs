mod common;

use common::{MapFetcher, SlowFetcher, WORDPRESS_HOME, catalog, readme};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use wp_recon::audit::WILDCARD_PROBE_SLUG;
use wp_recon::{
    ComponentAuditor, ComponentKind, Config, Database, DomainOutcome, Error, ExposureChecker,
    FindingKind, MemorySink, ReachabilityResolver, ScanOrchestrator,
};

const AKISMET_README: &str = "https://example.test/wp-content/plugins/akismet/readme.txt";

fn domain_list(domains: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(domains.as_bytes()).unwrap();
    file
}

fn akismet_database() -> Database {
    Database {
        plugins: catalog(ComponentKind::Plugin, &["akismet|<=4.2.1|XSS"]),
        ..Database::default()
    }
}

async fn run(
    fetcher: MapFetcher,
    database: Database,
    domains: &str,
) -> (wp_recon::RunSummary, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let config = Config {
        concurrency: 4,
        ..Config::default()
    };
    let orchestrator = ScanOrchestrator::new(
        Arc::new(fetcher),
        sink.clone(),
        Arc::new(database),
        &config,
    );
    let list = domain_list(domains);
    let summary = orchestrator.run(list.path()).await.unwrap();
    (summary, sink)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_limit_caps_requests_in_flight() {
    let fetcher = Arc::new(SlowFetcher::new(Duration::from_millis(20)));
    let sink = Arc::new(MemorySink::new());
    let config = Config {
        concurrency: 3,
        ..Config::default()
    };
    let orchestrator = ScanOrchestrator::new(
        fetcher.clone(),
        sink.clone(),
        Arc::new(Database::default()),
        &config,
    );

    let domains: String = (0..40).map(|i| format!("d{}.test\n", i)).collect();
    let list = domain_list(&domains);
    let summary = orchestrator.run(list.path()).await.unwrap();

    assert_eq!(summary.domains, 40);
    assert_eq!(summary.confirmed, 40);
    assert_eq!(sink.of_kind(FindingKind::PlatformDetected).len(), 40);
    assert!(fetcher.peak() >= 1);
    assert!(fetcher.peak() <= 3, "peak in flight was {}", fetcher.peak());
}

#[tokio::test]
async fn vulnerable_plugin_end_to_end() {
    let fetcher = MapFetcher::new()
        .route("https://example.test", 200, WORDPRESS_HOME)
        .route(AKISMET_README, 200, &readme("4.1.0"));

    let (summary, sink) = run(fetcher, akismet_database(), "example.test\n").await;

    assert_eq!(summary.domains, 1);
    assert_eq!(summary.confirmed, 1);
    assert_eq!(summary.vulnerable_components, 1);

    let platform = sink.of_kind(FindingKind::PlatformDetected);
    assert_eq!(platform.len(), 1);
    assert_eq!(platform[0].target, "https://example.test");
    assert_eq!(platform[0].version.as_deref(), Some("5.4"));

    let vulnerable = sink.of_kind(FindingKind::ComponentVulnerable);
    assert_eq!(vulnerable.len(), 1);
    assert_eq!(vulnerable[0].subject.as_deref(), Some("akismet"));
    assert_eq!(vulnerable[0].version.as_deref(), Some("4.1.0"));
    assert_eq!(vulnerable[0].detail, "XSS");
    assert_eq!(vulnerable[0].category, "plugins/akismet");

    assert!(sink.of_kind(FindingKind::ComponentClean).is_empty());
}

#[tokio::test]
async fn patched_plugin_is_clean() {
    let fetcher = MapFetcher::new()
        .route("https://example.test", 200, WORDPRESS_HOME)
        .route(AKISMET_README, 200, &readme("4.3.0"));

    let (summary, sink) = run(fetcher, akismet_database(), "example.test\n").await;

    assert_eq!(summary.vulnerable_components, 0);
    assert_eq!(sink.of_kind(FindingKind::PlatformDetected).len(), 1);
    assert!(sink.of_kind(FindingKind::ComponentVulnerable).is_empty());

    let clean = sink.of_kind(FindingKind::ComponentClean);
    assert_eq!(clean.len(), 1);
    assert_eq!(clean[0].subject.as_deref(), Some("akismet"));
    assert_eq!(clean[0].version.as_deref(), Some("4.3.0"));
}

#[tokio::test]
async fn missing_domain_list_is_fatal() {
    let orchestrator = ScanOrchestrator::new(
        Arc::new(MapFetcher::new()),
        Arc::new(MemorySink::new()),
        Arc::new(Database::default()),
        &Config::default(),
    );
    let err = orchestrator
        .run(std::path::Path::new("/nonexistent/domains.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DomainList { .. }));
}

#[tokio::test]
async fn mixed_domain_list() {
    let fetcher = MapFetcher::new()
        .route("https://example.test", 200, WORDPRESS_HOME)
        .route("https://plain.test", 200, "<html><body>static site</body></html>");

    let (summary, sink) = run(
        fetcher,
        Database::default(),
        "# targets\nexample.test\n\nplain.test\ndead.test\n",
    )
    .await;

    assert_eq!(summary.domains, 3);
    assert_eq!(summary.confirmed, 1);
    assert_eq!(summary.not_platform, 1);
    assert_eq!(summary.unreachable, 1);
    assert_eq!(sink.of_kind(FindingKind::PlatformDetected).len(), 1);
}

#[tokio::test]
async fn resolver_falls_through_to_www_http() {
    let fetcher = MapFetcher::new().route("http://www.example.test", 200, "");
    let target = ReachabilityResolver::new(&fetcher)
        .resolve("example.test")
        .await
        .unwrap();

    assert_eq!(target.base_url, "http://www.example.test");
    let order: Vec<String> = fetcher.calls().into_iter().map(|(_, url)| url).collect();
    let first_seen = |url: &str| order.iter().position(|u| u == url).unwrap();
    assert!(first_seen("https://example.test") < first_seen("http://example.test"));
    assert!(first_seen("http://example.test") < first_seen("https://www.example.test"));
    assert!(first_seen("https://www.example.test") < first_seen("http://www.example.test"));
}

#[tokio::test]
async fn detection_uses_blog_path() {
    let fetcher = MapFetcher::new()
        .route("https://example.test", 200, "<html><body>landing page</body></html>")
        .route("https://example.test/blog", 200, WORDPRESS_HOME);

    let (summary, sink) = run(fetcher, Database::default(), "example.test\n").await;

    assert_eq!(summary.confirmed, 1);
    let platform = sink.of_kind(FindingKind::PlatformDetected);
    assert_eq!(platform[0].target, "https://example.test/blog");
}

#[tokio::test]
async fn wildcard_host_skips_audit() {
    let wildcard = format!(
        "https://example.test/wp-content/plugins/{}/readme.txt",
        WILDCARD_PROBE_SLUG
    );
    let fetcher = MapFetcher::new()
        .route(&wildcard, 200, "Stable tag: 1.0")
        .route(AKISMET_README, 200, &readme("4.1.0"));
    let database = akismet_database();
    let sink = MemorySink::new();

    let report = ComponentAuditor::new(&fetcher, &sink, &database)
        .audit("https://example.test", &database.plugins)
        .await;

    assert!(report.aborted);
    assert!(report.findings.is_empty());
    assert!(!fetcher.requested(AKISMET_README));
}

#[tokio::test]
async fn one_clean_finding_per_slug() {
    let fetcher = MapFetcher::new().route(AKISMET_README, 200, &readme("2.0"));
    let database = Database {
        plugins: catalog(
            ComponentKind::Plugin,
            &["akismet|<1.0|old XSS", "akismet|>=5.0|new SQLi", "akismet|=1.5|CSRF"],
        ),
        ..Database::default()
    };
    let sink = MemorySink::new();

    let report = ComponentAuditor::new(&fetcher, &sink, &database)
        .audit("https://example.test", &database.plugins)
        .await;

    assert_eq!(report.installed, 1);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].kind, FindingKind::ComponentClean);
    assert_eq!(sink.findings(), report.findings);
    let readme_requests = fetcher
        .calls()
        .iter()
        .filter(|(_, url)| url == AKISMET_README)
        .count();
    assert_eq!(readme_requests, 1);
}

#[tokio::test]
async fn every_matching_advisory_is_reported() {
    let fetcher = MapFetcher::new().route(AKISMET_README, 200, &readme("3.0"));
    let database = Database {
        plugins: catalog(
            ComponentKind::Plugin,
            &["akismet|<4.0|XSS", "akismet|all|Info leak", "akismet|>3.0|SQLi"],
        ),
        ..Database::default()
    };
    let sink = MemorySink::new();

    let report = ComponentAuditor::new(&fetcher, &sink, &database)
        .audit("https://example.test", &database.plugins)
        .await;

    let details: Vec<&str> = report.findings.iter().map(|f| f.detail.as_str()).collect();
    assert_eq!(details, ["XSS", "Info leak"]);
}

#[tokio::test]
async fn error_page_means_not_installed() {
    let fetcher = MapFetcher::new().route(
        AKISMET_README,
        200,
        "<html><head><title>Not found</title></head><body>Version: 9.9</body></html>",
    );
    let database = akismet_database();
    let sink = MemorySink::new();

    let report = ComponentAuditor::new(&fetcher, &sink, &database)
        .audit("https://example.test", &database.plugins)
        .await;

    assert_eq!(report.installed, 0);
    assert!(report.findings.is_empty());
}

#[tokio::test]
async fn timthumb_scripts_are_probed() {
    let mut database = Database {
        timthumb_paths: vec![
            "wp-content/themes/dark/timthumb.php".to_string(),
            "wp-content/themes/dark/lib/thumb.php".to_string(),
        ],
        ..Database::default()
    };
    database.themes.merge_timthumbs(&database.timthumb_paths.clone());

    let fetcher = MapFetcher::new()
        .route(
            "https://example.test/wp-content/themes/dark/style.css",
            200,
            "/*\nTheme Name: Dark\nVersion: 1.2\n*/",
        )
        .route(
            "https://example.test/wp-content/themes/dark/timthumb.php",
            400,
            "A TimThumb error has occured: No image specified",
        )
        .route(
            "https://example.test/wp-content/themes/dark/lib/thumb.php",
            404,
            "Not Found",
        );
    let sink = MemorySink::new();

    let report = ComponentAuditor::new(&fetcher, &sink, &database)
        .audit("https://example.test", &database.themes)
        .await;

    assert_eq!(report.findings.len(), 1);
    let hit = &report.findings[0];
    assert_eq!(hit.kind, FindingKind::FileExposed);
    assert_eq!(hit.category, "timthumbs");
    assert_eq!(
        hit.target,
        "https://example.test/wp-content/themes/dark/timthumb.php"
    );
}

#[tokio::test]
async fn env_file_on_non_wordpress_host() {
    let fetcher = MapFetcher::new()
        .route("https://plain.test", 200, "<html><body>static site</body></html>")
        .route(
            "https://plain.test/.env",
            200,
            "APP_NAME=Shop\nDB_HOST=localhost\nDB_DATABASE=shop\nDB_USERNAME=root\nDB_PASSWORD=hunter2\nMAIL_HOST=smtp.mailgun.org\nMAIL_USERNAME=postmaster\nMAIL_PASSWORD=pw\n",
        );
    let database = Database {
        env_paths: vec!["/.env".to_string(), "/api/.env".to_string()],
        ..Database::default()
    };

    let (summary, sink) = run(fetcher, database, "plain.test\n").await;

    assert_eq!(summary.not_platform, 1);
    let files = sink.of_kind(FindingKind::FileExposed);
    let categories: Vec<&str> = files.iter().map(|f| f.category.as_str()).collect();
    assert_eq!(categories, ["env-production", "mysqlconfigs", "smtpconfigs"]);
    assert_eq!(
        files[1].detail,
        "HOST:plain.test USERNAME:root PASSWORD:hunter2 DATABASE:shop"
    );
}

#[tokio::test]
async fn config_backup_credentials() {
    let fetcher = MapFetcher::new().route(
        "https://example.test/wp-config.php.bak",
        200,
        "<?php\ndefine('DB_NAME', 'wp');\ndefine('DB_USER', 'admin');\ndefine('DB_PASSWORD', 'pw');\ndefine('DB_HOST', '127.0.0.1');\n",
    );
    let database = Database {
        config_backups: vec!["wp-config.php.bak".to_string(), "wp-config.old".to_string()],
        ..Database::default()
    };
    let sink = MemorySink::new();

    let findings = ExposureChecker::new(&fetcher, &sink, &database)
        .config_backups("https://example.test")
        .await;

    assert_eq!(findings.len(), 2);
    assert_eq!(findings[0].category, "configs");
    assert_eq!(findings[1].category, "mysqlconfigs");
    assert_eq!(
        findings[1].detail,
        "DB_HOST:example.test DB_NAME:wp DB_PASSWORD:pw DB_USER:admin"
    );
}

#[tokio::test]
async fn shell_check_stops_at_first_hit() {
    let fetcher = MapFetcher::new()
        .route("https://example.test/leaf.php", 200, "<title>Leaf PHPMailer</title>")
        .route(
            "https://example.test/up.php",
            200,
            r#"<form><input type="file"><input type="submit"></form>"#,
        );
    let database = Database {
        shells: vec!["leaf.php".to_string(), "up.php".to_string()],
        ..Database::default()
    };
    let sink = MemorySink::new();

    let findings = ExposureChecker::new(&fetcher, &sink, &database)
        .shells("https://example.test")
        .await;

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].category, "shellmails");
    assert!(!fetcher.requested("https://example.test/up.php"));
}

#[tokio::test]
async fn secrets_in_fetched_bodies_are_reported() {
    let home = format!(
        "{}<script>var key = 'AIza{}';</script>",
        WORDPRESS_HOME,
        "B".repeat(35)
    );
    let fetcher = MapFetcher::new().route("https://example.test", 200, &home);

    let (_, sink) = run(fetcher, Database::default(), "example.test\n").await;

    let secrets = sink.of_kind(FindingKind::SecretExposed);
    assert_eq!(secrets.len(), 1);
    assert_eq!(secrets[0].subject.as_deref(), Some("Google API Key"));
    assert_eq!(secrets[0].target, "https://example.test");
}

#[tokio::test]
async fn single_domain_outcome() {
    let fetcher = MapFetcher::new().route("https://example.test", 200, WORDPRESS_HOME);
    let orchestrator = ScanOrchestrator::new(
        Arc::new(fetcher),
        Arc::new(MemorySink::new()),
        Arc::new(Database::default()),
        &Config::default(),
    );

    assert_eq!(
        orchestrator.scan_domain("example.test").await,
        DomainOutcome::Confirmed { vulnerable: 0 }
    );
    assert_eq!(
        orchestrator.scan_domain("dead.test").await,
        DomainOutcome::Unreachable
    );
}
