use std::collections::HashMap;
use std::io::Read;

use log::debug;
use reqwest::blocking::{Client, ClientBuilder, Response};
use reqwest::header::HeaderMap;

use crate::config::ScanConfig;
use crate::error::{ConfigError, HttpError};

/// Fixed-shape response. Header names are lower-cased; repeated headers are
/// joined with ", ". The body may be a prefix of what the server sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The only network surface the scanner touches. Non-2xx statuses are
/// ordinary responses; only transport failures are errors.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, HttpError>;
    fn post(&self, url: &str, form: &[(String, String)]) -> Result<HttpResponse, HttpError>;
}

/// Blocking reqwest client with a fixed timeout, shared connection pool and
/// cookie store. Bodies are read up to `max_body_bytes`, so a large exposed
/// file is classified from its prefix instead of timing out mid-download.
pub struct ReqwestClient {
    inner: Client,
    max_body: u64,
}

impl ReqwestClient {
    pub fn new(config: &ScanConfig) -> Result<Self, ConfigError> {
        let inner = ClientBuilder::new()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .cookie_store(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(ReqwestClient {
            inner,
            max_body: u64::try_from(config.max_body_bytes).unwrap_or(u64::MAX),
        })
    }

    fn read(&self, url: &str, resp: Response) -> Result<HttpResponse, HttpError> {
        let status = resp.status().as_u16();
        let headers = flatten_headers(resp.headers());

        let mut raw = Vec::new();
        resp.take(self.max_body)
            .read_to_end(&mut raw)
            .map_err(|e| HttpError::Connection(format!("reading body from {}: {}", url, e)))?;
        let body = String::from_utf8_lossy(&raw).into_owned();

        debug!("{} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, headers, body })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        let resp = self.inner.get(url).send().map_err(|source| HttpError::Request {
            url: url.to_string(),
            source,
        })?;
        self.read(url, resp)
    }

    fn post(&self, url: &str, form: &[(String, String)]) -> Result<HttpResponse, HttpError> {
        let resp = self
            .inner
            .post(url)
            .form(form)
            .send()
            .map_err(|source| HttpError::Request {
                url: url.to_string(),
                source,
            })?;
        self.read(url, resp)
    }
}

fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut out: HashMap<String, String> = HashMap::new();
    for (key, value) in headers {
        let value = value.to_str().unwrap_or("INVALID");
        out.entry(key.as_str().to_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    out
}
