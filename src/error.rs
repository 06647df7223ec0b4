// Error types for webprobe
//
// Target-site behaviour (refused connections, timeouts, bad certificates) is
// never fatal: callers turn `HttpError` and `TlsError` into "no evidence" or a
// degraded ScanResult. `ConfigError` is the only error that escapes the core.

use std::time::Duration;
use thiserror::Error;

/// Misuse of the scanner. Raised immediately, never swallowed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("payload sample size must be at least 1")]
    ZeroPayloadSample,

    #[error("worker pool needs at least one thread")]
    ZeroConcurrency,

    #[error("payload library has no {kind} entries")]
    EmptyPayloads { kind: &'static str },

    #[error("response body limit must be at least 1 byte")]
    ZeroBodyLimit,

    #[error("security header set is empty")]
    EmptyHeaderSet,

    #[error("{which} timeout must be non-zero (got {value:?})")]
    ZeroTimeout { which: &'static str, value: Duration },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Transport-level failure of a single request.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("connection failed: {0}")]
    Connection(String),
}

/// Failure while inspecting a TLS endpoint.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("DNS resolution failed for {hostname}: {source}")]
    Resolve {
        hostname: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no addresses found for {0}")]
    NoAddress(String),

    #[error("invalid server name {0}")]
    ServerName(String),

    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    #[error("server presented no certificate")]
    NoCertificate,

    #[error("certificate parse error: {0}")]
    Certificate(String),
}

impl From<rustls::Error> for TlsError {
    fn from(err: rustls::Error) -> Self {
        TlsError::Handshake(err.to_string())
    }
}
