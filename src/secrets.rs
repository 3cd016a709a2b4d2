//! Leaked credential detection
//!
//! Every body the engine fetches is passed through [`scan`]. Matches are
//! reported as [`FindingKind::SecretExposed`](crate::FindingKind) findings; the
//! scan never influences the control flow of the probe that fetched the body.

use crate::finding::Finding;
use crate::sink::FindingSink;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Category most secrets are written to
pub const TOKENS_CATEGORY: &str = "tokens";

/// A named credential pattern
///
/// When the regex has a capture group, group 1 is reported instead of the
/// whole match.
#[derive(Debug)]
pub struct SecretPattern {
    pub name: &'static str,
    pub category: &'static str,
    pub regex: Regex,
}

impl SecretPattern {
    fn new(name: &'static str, category: &'static str, pattern: &str) -> Self {
        Self {
            name,
            category,
            regex: Regex::new(pattern).expect("secret pattern"),
        }
    }

    fn token(name: &'static str, pattern: &str) -> Self {
        Self::new(name, TOKENS_CATEGORY, pattern)
    }
}

static PATTERNS: LazyLock<Vec<SecretPattern>> = LazyLock::new(|| {
    vec![
        SecretPattern::token("AWS Access Key ID", r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b"),
        SecretPattern::token(
            "AWS Secret Access Key",
            r#"(?i)aws_secret_access_key\s*[=:]\s*["']?([0-9A-Za-z/+=]{40})"#,
        ),
        SecretPattern::token(
            "AWS Session Token",
            r#"(?i)aws_session_token\s*[=:]\s*["']?([A-Za-z0-9/+=]{16,})"#,
        ),
        SecretPattern::token("Amazon MWS Auth Token", r"amzn\.mws\.[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}"),
        SecretPattern::token(
            "Azure Storage Connection String",
            r"DefaultEndpointsProtocol=https?;AccountName=[^;\s]+;AccountKey=[^;\s]+",
        ),
        SecretPattern::token("Azure Shared Key", r"(?i)SharedKey\s+[^\s:]+:[A-Za-z0-9+/=]{20,}"),
        SecretPattern::token("GCP Service Account", r#""type"\s*:\s*"service_account""#),
        SecretPattern::token(
            "GCP OAuth Client ID",
            r"[0-9]+-[0-9A-Za-z_]{32}\.apps\.googleusercontent\.com",
        ),
        SecretPattern::token("Google API Key", r"\bAIza[0-9A-Za-z_-]{35}\b"),
        SecretPattern::token("Google OAuth Access Token", r"\bya29\.[0-9A-Za-z_-]{20,}"),
        SecretPattern::token("GitHub Token", r"\bgh[pousr]_[A-Za-z0-9]{36,}\b"),
        SecretPattern::token("GitLab Personal Access Token", r"\bglpat-[A-Za-z0-9_-]{20,}"),
        SecretPattern::token(
            "Slack Token",
            r"\bxox[pboa]-[0-9]{10,13}-[0-9]{10,13}-[A-Za-z0-9]{23,32}\b",
        ),
        SecretPattern::token(
            "Slack Webhook",
            r"https://hooks\.slack\.com/services/[A-Z0-9]{9,11}/[A-Z0-9]{9,11}/[A-Za-z0-9]+",
        ),
        SecretPattern::token("Stripe Publishable Key", r"\bpk_(?:test|live)_[0-9A-Za-z]{24,99}"),
        SecretPattern::token("Stripe Secret Key", r"\b[sr]k_(?:test|live)_[0-9A-Za-z]{24,99}"),
        SecretPattern::token("Square Access Token", r"\bsq0atp-[0-9A-Za-z_-]{22}"),
        SecretPattern::token("Square OAuth Secret", r"\bsq0csp-[0-9A-Za-z_-]{43}"),
        SecretPattern::token("Twilio API Key", r"\bSK[0-9a-fA-F]{32}\b"),
        SecretPattern::token("Twilio Account SID", r"\bAC[0-9a-fA-F]{32}\b"),
        SecretPattern::token(
            "SendGrid API Key",
            r"\bSG\.[0-9A-Za-z_-]{22}\.[0-9A-Za-z_-]{43}\b",
        ),
        SecretPattern::token("Mailchimp API Key", r"\b[0-9a-f]{32}-us[0-9]{1,2}\b"),
        SecretPattern::token("Mailgun API Key", r"\bkey-[0-9A-Za-z]{32}\b"),
        SecretPattern::token(
            "Heroku API Key",
            r#"(?i)heroku_api_key\s*[=:]\s*["']?([0-9a-f-]{32,36})"#,
        ),
        SecretPattern::token("Supabase Token", r"\bsbp_[A-Za-z0-9]{40}\b"),
        SecretPattern::token(
            "HubSpot Webhook",
            r"https://api\.hubapi\.com/webhooks/v1/[a-z0-9]+/",
        ),
        SecretPattern::token(
            "HubSpot Private App Token",
            r"\bpat-(?:na|eu)1-[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b",
        ),
        SecretPattern::token("Figma Token", r"\bFIGMA_TOKEN_[0-9A-Za-z_-]+"),
        SecretPattern::token(
            "Private Key",
            r"-----BEGIN (?:RSA |DSA |EC |OPENSSH |ENCRYPTED )?PRIVATE KEY-----",
        ),
        SecretPattern::new(
            "DigitalOcean Token",
            "digitalocean_tokens",
            r"(?i)\bdop_v1_[a-z0-9]{64}\b",
        ),
        SecretPattern::new(
            "Firebase Database",
            "firebaseio",
            r"(?i)\b[a-z0-9.-]+\.firebaseio\.com\b",
        ),
    ]
});

/// Registered patterns
pub fn patterns() -> &'static [SecretPattern] {
    &PATTERNS
}

/// Find every secret in `body`, each distinct value reported once per pattern
pub fn scan(body: &str, source_url: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    for pattern in patterns() {
        let mut seen = HashSet::new();
        for caps in pattern.regex.captures_iter(body) {
            let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                continue;
            };
            if seen.insert(m.as_str()) {
                findings.push(Finding::secret_exposed(
                    pattern.category,
                    source_url,
                    pattern.name,
                    m.as_str(),
                ));
            }
        }
    }

    findings
}

/// Scan a body and emit whatever is found
pub async fn report(sink: &dyn FindingSink, body: &str, source_url: &str) {
    for finding in scan(body, source_url) {
        sink.emit(finding).await;
    }
}
