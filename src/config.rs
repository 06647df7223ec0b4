use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::Severity;
use crate::payloads::PayloadLibrary;

/// A response header whose absence weakens the page, with its documented severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityHeader {
    pub name: String,
    pub severity: Severity,
}

const SECURITY_HEADERS: &[(&str, Severity)] = &[
    ("Strict-Transport-Security", Severity::Medium),
    ("Content-Security-Policy", Severity::High),
    ("X-Content-Type-Options", Severity::Medium),
    ("X-Frame-Options", Severity::Medium),
    ("X-XSS-Protection", Severity::Low),
    ("Referrer-Policy", Severity::Low),
    ("Feature-Policy", Severity::Low),
];

const SENSITIVE_PATHS: &[&str] = &[
    "/.env",
    "/.git/config",
    "/.git/HEAD",
    "/.svn/entries",
    "/.htpasswd",
    "/.htaccess",
    "/.DS_Store",
    "/backup.sql",
    "/backup.zip",
    "/backup.tar.gz",
    "/dump.sql",
    "/database.sql",
    "/config.php.bak",
    "/wp-config.php.bak",
    "/web.config",
    "/config.json",
    "/admin",
    "/administrator",
    "/phpmyadmin",
    "/server-status",
    "/server-info",
    "/phpinfo.php",
    "/info.php",
];

pub fn default_security_headers() -> Vec<SecurityHeader> {
    SECURITY_HEADERS
        .iter()
        .map(|(name, severity)| SecurityHeader { name: name.to_string(), severity: *severity })
        .collect()
}

pub fn default_sensitive_paths() -> Vec<String> {
    SENSITIVE_PATHS.iter().map(|p| p.to_string()).collect()
}

/// Every tunable the scanner reads. Invalid values are programming errors,
/// rejected by `validate` before any request is made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub request_timeout: Duration,
    pub tls_timeout: Duration,
    /// How many payloads per sub-library each field receives.
    pub payload_sample: usize,
    pub max_concurrency: usize,
    pub follow_redirects: bool,
    /// Applies to the HTTP client only; TLS inspection always validates.
    pub accept_invalid_certs: bool,
    pub user_agent: String,
    pub placeholder: String,
    pub security_headers: Vec<SecurityHeader>,
    pub sensitive_paths: Vec<String>,
    /// A sensitive path body must be strictly longer than this.
    pub sensitive_min_body: usize,
    pub not_found_marker: String,
    /// Response bodies are cut off after this many bytes.
    pub max_body_bytes: usize,
    /// Days before certificate expiry that raise a TLS finding.
    pub cert_expiry_warning_days: i64,
    pub payloads: PayloadLibrary,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            request_timeout: Duration::from_secs(10),
            tls_timeout: Duration::from_secs(5),
            payload_sample: 3,
            max_concurrency: 3,
            follow_redirects: true,
            accept_invalid_certs: false,
            user_agent: format!("webprobe/{}", env!("CARGO_PKG_VERSION")),
            placeholder: "test".to_string(),
            security_headers: default_security_headers(),
            sensitive_paths: default_sensitive_paths(),
            sensitive_min_body: 0,
            not_found_marker: "not found".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
            cert_expiry_warning_days: 30,
            payloads: PayloadLibrary::default(),
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.payload_sample == 0 {
            return Err(ConfigError::ZeroPayloadSample);
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout { which: "request", value: self.request_timeout });
        }
        if self.tls_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout { which: "TLS", value: self.tls_timeout });
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::ZeroBodyLimit);
        }
        if self.security_headers.is_empty() {
            return Err(ConfigError::EmptyHeaderSet);
        }
        self.payloads.validate()
    }
}
