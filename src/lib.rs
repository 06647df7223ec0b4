//! Heuristic web vulnerability scanner.
//!
//! A scan fetches a page once, fingerprints it, audits its security headers,
//! inspects TLS for https targets, extracts forms, fires XSS / SQL injection
//! payloads through them and through the query string, checks well-known
//! sensitive paths, and reduces everything to a 0-100 score.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod forms;
pub mod headers;
pub mod html;
pub mod http;
pub mod logger;
pub mod models;
pub mod output;
pub mod payloads;
pub mod probe;
pub mod scanner;
pub mod score;
pub mod tls;

pub use config::ScanConfig;
pub use error::{ConfigError, HttpError, TlsError};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use models::{Category, FormDescriptor, ScanResult, Severity, TlsInfo, Vulnerability};
pub use scanner::Scanner;
