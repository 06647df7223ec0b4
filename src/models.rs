use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ── Severity / category ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Points subtracted from the security score per finding.
    pub fn penalty(self) -> u32 {
        match self {
            Severity::Critical => 25,
            Severity::High => 15,
            Severity::Medium => 10,
            Severity::Low => 5,
        }
    }

    pub fn label(self) -> ColoredString {
        match self {
            Severity::Critical => "CRIT".magenta().bold(),
            Severity::High => "HIGH".red().bold(),
            Severity::Medium => "MED".yellow().bold(),
            Severity::Low => "LOW".blue(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    XssReflected,
    SqlInjection,
    CsrfMissing,
    HeaderMissing,
    SensitiveFile,
    TlsIssue,
}

impl Category {
    pub fn code(self) -> &'static str {
        match self {
            Category::XssReflected => "XSS_REFLECTED",
            Category::SqlInjection => "SQL_INJECTION",
            Category::CsrfMissing => "CSRF_MISSING",
            Category::HeaderMissing => "HEADER_MISSING",
            Category::SensitiveFile => "SENSITIVE_FILE",
            Category::TlsIssue => "TLS_ISSUE",
        }
    }

    /// Severity used when the evidence does not dictate one.
    pub fn default_severity(self) -> Severity {
        match self {
            Category::XssReflected => Severity::High,
            Category::SqlInjection => Severity::Critical,
            Category::CsrfMissing => Severity::Medium,
            Category::HeaderMissing => Severity::Low,
            Category::SensitiveFile => Severity::Medium,
            Category::TlsIssue => Severity::High,
        }
    }

    pub fn remediation(self) -> &'static str {
        match self {
            Category::XssReflected => {
                "Encode user-controlled data on output for its HTML context and deploy a restrictive Content-Security-Policy."
            }
            Category::SqlInjection => {
                "Use parameterized queries or prepared statements; never build SQL by concatenating request input."
            }
            Category::CsrfMissing => {
                "Add a per-session anti-CSRF token to the form and verify it server-side; set SameSite on session cookies."
            }
            Category::HeaderMissing => {
                "Configure the web server or application to send the missing security header on every response."
            }
            Category::SensitiveFile => {
                "Remove the file from the web root or deny access to it in the server configuration."
            }
            Category::TlsIssue => {
                "Serve a valid certificate from a trusted CA, renew it before expiry, and allow only TLS 1.2 or later."
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ── Findings ──

pub type Evidence = BTreeMap<String, String>;

/// One confirmed or suspected weakness. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String,
    pub target_url: String,
    pub category: Category,
    pub severity: Severity,
    pub evidence: Evidence,
    pub remediation: String,
    pub discovered_at: DateTime<Utc>,
}

impl Vulnerability {
    fn new(ordinal: usize, category: Category, target_url: &str, severity: Severity, evidence: Evidence) -> Self {
        let digest = Sha256::digest(target_url.as_bytes());
        let short: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();

        Vulnerability {
            id: format!("{}-{:03}-{}", category.code(), ordinal, short),
            target_url: target_url.to_string(),
            category,
            severity,
            evidence,
            remediation: category.remediation().to_string(),
            discovered_at: Utc::now(),
        }
    }
}

// Evidence keys naming the input a finding is about, in lookup order.
const SUBJECT_KEYS: &[&str] = &["field", "path", "header"];

fn subject(evidence: &Evidence) -> Option<&str> {
    SUBJECT_KEYS
        .iter()
        .find_map(|k| evidence.get(*k))
        .map(String::as_str)
}

/// Per-scan accumulator. Assigns discovery-order ids; one instance per scan,
/// never shared between scans. A (category, target, field/path/header)
/// combination is recorded at most once.
#[derive(Debug, Default)]
pub struct Findings {
    items: Vec<Vulnerability>,
}

impl Findings {
    pub fn new() -> Self {
        Findings::default()
    }

    /// Returns false when an equivalent finding was already recorded.
    pub fn record(&mut self, category: Category, target_url: &str, severity: Severity, evidence: Evidence) -> bool {
        let key = subject(&evidence);
        let duplicate = self
            .items
            .iter()
            .any(|v| v.category == category && v.target_url == target_url && subject(&v.evidence) == key);
        if duplicate {
            return false;
        }

        let ordinal = self.items.len() + 1;
        self.items.push(Vulnerability::new(ordinal, category, target_url, severity, evidence));
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Vulnerability] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Vulnerability> {
        self.items
    }
}

/// Shorthand for building an evidence map from string pairs.
pub fn evidence<const N: usize>(pairs: [(&str, &str); N]) -> Evidence {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ── Forms ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FormMethod {
    Get,
    Post,
}

impl FormMethod {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
            Some("post") => FormMethod::Post,
            _ => FormMethod::Get,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FormMethod::Get => "GET",
            FormMethod::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub value: String,
    /// Text-like fields receive payloads; the rest ride along with their value.
    pub probe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDescriptor {
    pub action_url: String,
    pub method: FormMethod,
    pub fields: Vec<FormField>,
    pub has_csrf_token: bool,
}

impl FormDescriptor {
    /// Submission data with `field` replaced by `payload`.
    pub fn data_with(&self, field: &str, payload: &str) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|f| {
                let value = if f.name == field { payload } else { f.value.as_str() };
                (f.name.clone(), value.to_string())
            })
            .collect()
    }
}

// ── TLS ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub not_before: String,
    pub not_after: String,
    pub days_until_expiry: i64,
    pub sans: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsInfo {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TlsInfo {
    pub fn failed(error: impl Into<String>) -> Self {
        TlsInfo {
            valid: false,
            protocol: None,
            cipher: None,
            certificate: None,
            error: Some(error.into()),
        }
    }
}

// ── Scan result ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
    pub http_status: u16,
    pub technologies: BTreeSet<String>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub security_headers: BTreeMap<String, bool>,
    pub forms_found: usize,
    pub tls_info: TlsInfo,
    pub security_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    pub fn is_reachable(&self) -> bool {
        self.http_status != 0
    }

    pub fn count_by(&self, category: Category) -> usize {
        self.vulnerabilities
            .iter()
            .filter(|v| v.category == category)
            .count()
    }
}
