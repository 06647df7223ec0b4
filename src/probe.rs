use log::{debug, info};
use url::Url;

use crate::config::ScanConfig;
use crate::error::HttpError;
use crate::http::{HttpClient, HttpResponse};
use crate::models::{evidence, Category, Findings, FormDescriptor, FormMethod, Severity};
use crate::payloads::PayloadLibrary;

// Path fragments that mark credentials, configuration or backups.
const HIGH_RISK_PATH_MARKERS: &[&str] = &[
    "env", "config", "backup", "dump", "admin", "passwd", ".sql", ".git",
];

/// Result of a single probe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The response confirmed the weakness; carries what matched.
    Vulnerable(String),
    Clean,
    /// The request failed; no evidence either way.
    Inconclusive,
}

/// Fires payloads through forms, query strings and well-known paths.
pub struct PayloadProbe<'a, C: HttpClient + ?Sized> {
    client: &'a C,
    payloads: &'a PayloadLibrary,
    sample: usize,
    min_body: usize,
    not_found_marker: String,
}

impl<'a, C: HttpClient + ?Sized> PayloadProbe<'a, C> {
    pub fn new(client: &'a C, config: &'a ScanConfig) -> Self {
        PayloadProbe {
            client,
            payloads: &config.payloads,
            sample: config.payload_sample,
            min_body: config.sensitive_min_body,
            not_found_marker: config.not_found_marker.to_lowercase(),
        }
    }

    /// CSRF check, then reflected XSS and SQL injection per probe-able field.
    /// Each field yields at most one finding per category.
    pub fn probe(&self, form: &FormDescriptor, findings: &mut Findings) {
        if !form.has_csrf_token {
            let names = form
                .fields
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(",");
            findings.record(
                Category::CsrfMissing,
                &form.action_url,
                Category::CsrfMissing.default_severity(),
                evidence([("method", form.method.as_str()), ("fields", names.as_str())]),
            );
        }

        let targets: Vec<&str> = form
            .fields
            .iter()
            .filter(|f| f.probe)
            .map(|f| f.name.as_str())
            .collect();

        for field in &targets {
            for payload in self.payloads.xss_sample(self.sample) {
                let outcome = self.classify(self.submit(form, field, payload), |resp| {
                    reflected(resp, payload)
                });
                if let Outcome::Vulnerable(_) = outcome {
                    info!("reflected XSS in {} field {}", form.action_url, field);
                    findings.record(
                        Category::XssReflected,
                        &form.action_url,
                        Severity::High,
                        evidence([
                            ("field", *field),
                            ("payload", payload.as_str()),
                            ("method", form.method.as_str()),
                        ]),
                    );
                    break;
                }
            }
        }

        for field in &targets {
            for payload in self.payloads.sqli_sample(self.sample) {
                let outcome = self.classify(self.submit(form, field, payload), |resp| {
                    self.payloads.match_sql_error(&resp.body).map(str::to_string)
                });
                if let Outcome::Vulnerable(matched) = outcome {
                    info!("SQL error leaked by {} field {}", form.action_url, field);
                    findings.record(
                        Category::SqlInjection,
                        &form.action_url,
                        Severity::Critical,
                        evidence([
                            ("field", *field),
                            ("payload", payload.as_str()),
                            ("error", matched.as_str()),
                            ("method", form.method.as_str()),
                        ]),
                    );
                    break;
                }
            }
        }
    }

    /// Reflected XSS through each existing query parameter of `url`, via GET.
    pub fn probe_query_params(&self, url: &str, findings: &mut Findings) {
        let Ok(parsed) = Url::parse(url) else {
            debug!("not probing query of unparseable {}", url);
            return;
        };
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();

        let mut seen: Vec<&str> = Vec::new();
        for (name, _) in &pairs {
            if seen.contains(&name.as_str()) {
                continue;
            }
            seen.push(name.as_str());

            for payload in self.payloads.xss_sample(self.sample) {
                let mut mutated = parsed.clone();
                {
                    let mut query = mutated.query_pairs_mut();
                    query.clear();
                    let mut replaced = false;
                    for (k, v) in &pairs {
                        if k == name && !replaced {
                            query.append_pair(k, payload);
                            replaced = true;
                        } else {
                            query.append_pair(k, v);
                        }
                    }
                }

                let outcome = self.classify(self.client.get(mutated.as_str()), |resp| {
                    reflected(resp, payload)
                });
                if let Outcome::Vulnerable(_) = outcome {
                    info!("reflected XSS in query parameter {} of {}", name, url);
                    findings.record(
                        Category::XssReflected,
                        url,
                        Severity::High,
                        evidence([("field", name.as_str()), ("payload", payload.as_str()), ("method", "GET")]),
                    );
                    break;
                }
            }
        }
    }

    /// GET each path against the origin of `base_url`. A 200 with a
    /// non-trivial body that does not read as a "not found" page is flagged.
    pub fn probe_sensitive_paths(&self, base_url: &str, paths: &[String], findings: &mut Findings) {
        let Ok(base) = Url::parse(base_url) else {
            debug!("not probing paths of unparseable {}", base_url);
            return;
        };

        for path in paths {
            let rel = if path.starts_with('/') { path.clone() } else { format!("/{}", path) };
            let Ok(target) = base.join(&rel) else {
                continue;
            };

            let outcome = self.classify(self.client.get(target.as_str()), |resp| {
                self.exposed(resp).then(|| resp.body.len().to_string())
            });
            if let Outcome::Vulnerable(size) = outcome {
                info!("sensitive path exposed: {}", target);
                findings.record(
                    Category::SensitiveFile,
                    target.as_str(),
                    sensitive_severity(&rel),
                    evidence([("path", rel.as_str()), ("status", "200"), ("bytes", size.as_str())]),
                );
            }
        }
    }

    fn exposed(&self, resp: &HttpResponse) -> bool {
        resp.status == 200
            && resp.body.len() > self.min_body
            && !resp.body.to_lowercase().contains(&self.not_found_marker)
    }

    fn submit(&self, form: &FormDescriptor, field: &str, payload: &str) -> Result<HttpResponse, HttpError> {
        let data = form.data_with(field, payload);
        match form.method {
            FormMethod::Post => self.client.post(&form.action_url, &data),
            FormMethod::Get => {
                let mut url = Url::parse(&form.action_url).map_err(|source| HttpError::InvalidUrl {
                    url: form.action_url.clone(),
                    source,
                })?;
                url.query_pairs_mut().clear().extend_pairs(data.iter());
                self.client.get(url.as_str())
            }
        }
    }

    fn classify<F>(&self, response: Result<HttpResponse, HttpError>, detect: F) -> Outcome
    where
        F: FnOnce(&HttpResponse) -> Option<String>,
    {
        match response {
            Ok(resp) => match detect(&resp) {
                Some(matched) => Outcome::Vulnerable(matched),
                None => Outcome::Clean,
            },
            Err(e) => {
                debug!("probe inconclusive: {}", e);
                Outcome::Inconclusive
            }
        }
    }
}

fn reflected(resp: &HttpResponse, payload: &str) -> Option<String> {
    (resp.is_success() && resp.body.contains(payload)).then(|| payload.to_string())
}

pub fn sensitive_severity(path: &str) -> Severity {
    let lower = path.to_ascii_lowercase();
    if HIGH_RISK_PATH_MARKERS.iter().any(|m| lower.contains(m)) {
        Severity::High
    } else {
        Severity::Medium
    }
}
