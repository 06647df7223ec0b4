use std::collections::{BTreeMap, HashMap};

use crate::config::SecurityHeader;
use crate::models::{evidence, Category, Findings, Severity};

/// Checks presence (not value) of the configured security headers.
pub struct SecurityHeaderAuditor {
    headers: Vec<SecurityHeader>,
}

impl SecurityHeaderAuditor {
    pub fn new(headers: Vec<SecurityHeader>) -> Self {
        SecurityHeaderAuditor { headers }
    }

    /// Every configured header is a key; the value says whether the
    /// response carried it, matched case-insensitively.
    pub fn audit(&self, response_headers: &HashMap<String, String>) -> BTreeMap<String, bool> {
        self.headers
            .iter()
            .map(|h| {
                let present = response_headers
                    .keys()
                    .any(|k| k.eq_ignore_ascii_case(&h.name));
                (h.name.clone(), present)
            })
            .collect()
    }

    pub fn missing_count(audit: &BTreeMap<String, bool>) -> usize {
        audit.values().filter(|present| !**present).count()
    }

    pub fn severity_of(&self, name: &str) -> Severity {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.severity)
            .unwrap_or_else(|| Category::HeaderMissing.default_severity())
    }

    /// HEADER_MISSING findings for reporting, one per absent header, at the
    /// header's documented severity. Not part of ScanResult.vulnerabilities:
    /// the score already charges missing headers separately.
    pub fn findings(&self, url: &str, audit: &BTreeMap<String, bool>) -> Findings {
        let mut findings = Findings::new();
        for (name, _) in audit.iter().filter(|(_, present)| !**present) {
            findings.record(
                Category::HeaderMissing,
                url,
                self.severity_of(name),
                evidence([("header", name.as_str())]),
            );
        }
        findings
    }
}
