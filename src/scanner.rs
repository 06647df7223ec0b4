use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use url::Url;

use crate::config::ScanConfig;
use crate::error::{ConfigError, HttpError};
use crate::fingerprint;
use crate::forms;
use crate::headers::SecurityHeaderAuditor;
use crate::http::{HttpClient, ReqwestClient};
use crate::models::{Findings, ScanResult, TlsInfo};
use crate::probe::PayloadProbe;
use crate::score;
use crate::tls::{self, TlsInspector};

/// Runs the full pipeline for one URL, or many on a bounded worker pool.
/// Holds no per-scan state: every `scan` builds its own findings.
pub struct Scanner<C: HttpClient> {
    client: C,
    config: ScanConfig,
    auditor: SecurityHeaderAuditor,
    tls: TlsInspector,
}

impl Scanner<ReqwestClient> {
    pub fn from_config(config: ScanConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = ReqwestClient::new(&config)?;
        Scanner::with_client(client, config)
    }
}

impl<C: HttpClient> Scanner<C> {
    pub fn with_client(client: C, config: ScanConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Scanner {
            client,
            auditor: SecurityHeaderAuditor::new(config.security_headers.clone()),
            tls: TlsInspector::new(config.tls_timeout),
            config,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn auditor(&self) -> &SecurityHeaderAuditor {
        &self.auditor
    }

    /// Never fails: an unreachable or unparseable target yields a ScanResult
    /// with status 0 and score 0.
    pub fn scan(&self, url: &str) -> ScanResult {
        let started = Instant::now();
        let timestamp = Utc::now();
        info!("Scanning {}", url);

        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(source) => {
                let err = HttpError::InvalidUrl { url: url.to_string(), source };
                return self.unreachable(url, timestamp, started, err.to_string());
            }
        };

        let response = match self.client.get(url) {
            Ok(resp) => resp,
            Err(e) => return self.unreachable(url, timestamp, started, e.to_string()),
        };

        let technologies = fingerprint::identify(&response.headers, &response.body);
        let security_headers = self.auditor.audit(&response.headers);
        let mut findings = Findings::new();

        let tls_info = if parsed.scheme() == "https" {
            let host = parsed.host_str().unwrap_or_default();
            let port = parsed.port_or_known_default().unwrap_or(443);
            let outcome = self.tls.try_inspect(host, port);
            tls::audit(url, &outcome, self.config.cert_expiry_warning_days, &mut findings);
            outcome.unwrap_or_else(|e| TlsInfo::failed(e.to_string()))
        } else {
            TlsInfo::failed("plain HTTP target; TLS not inspected")
        };

        let page_forms = forms::extract(&response.body, url, &self.config.placeholder);
        let probe = PayloadProbe::new(&self.client, &self.config);
        for (i, form) in page_forms.iter().enumerate() {
            if page_forms[..i].contains(form) {
                debug!("form posting to {} already probed", form.action_url);
                continue;
            }
            probe.probe(form, &mut findings);
        }
        probe.probe_query_params(url, &mut findings);
        probe.probe_sensitive_paths(url, &self.config.sensitive_paths, &mut findings);

        let vulnerabilities = findings.into_vec();
        let missing = SecurityHeaderAuditor::missing_count(&security_headers);
        let security_score = score::score(missing, &vulnerabilities);

        info!(
            "{}: HTTP {}, {} forms, {} findings, score {}",
            url,
            response.status,
            page_forms.len(),
            vulnerabilities.len(),
            security_score
        );

        ScanResult {
            url: url.to_string(),
            timestamp,
            duration: started.elapsed(),
            http_status: response.status,
            technologies,
            vulnerabilities,
            security_headers,
            forms_found: page_forms.len(),
            tls_info,
            security_score,
            error: None,
        }
    }

    /// One result per input URL, in completion order. A failing or panicking
    /// scan degrades to an unreachable result and never affects the others.
    pub fn scan_many(&self, urls: &[String], max_concurrency: usize) -> Result<Vec<ScanResult>, ConfigError> {
        if max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_concurrency)
            .thread_name(|i| format!("scan-worker-{}", i))
            .build()?;

        let (tx, rx) = mpsc::channel();
        pool.scope(|s| {
            for url in urls {
                let tx = tx.clone();
                s.spawn(move |_| {
                    let started = Instant::now();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| self.scan(url))).unwrap_or_else(|_| {
                        warn!("scan of {} panicked", url);
                        self.unreachable(url, Utc::now(), started, "scan aborted unexpectedly".to_string())
                    });
                    let _ = tx.send(result);
                });
            }
        });
        drop(tx);

        Ok(rx.into_iter().collect())
    }

    fn unreachable(&self, url: &str, timestamp: DateTime<Utc>, started: Instant, error: String) -> ScanResult {
        warn!("{} unreachable: {}", url, error);
        ScanResult {
            url: url.to_string(),
            timestamp,
            duration: started.elapsed(),
            http_status: 0,
            technologies: BTreeSet::new(),
            vulnerabilities: Vec::new(),
            security_headers: self.auditor.audit(&HashMap::new()),
            forms_found: 0,
            tls_info: TlsInfo::failed(error.clone()),
            security_score: 0,
            error: Some(error),
        }
    }
}
