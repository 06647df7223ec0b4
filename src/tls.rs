use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use log::debug;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore};
use x509_parser::prelude::*;

use crate::error::TlsError;
use crate::models::{evidence, CertificateInfo, Category, Findings, Severity, TlsInfo};

/// Opens a validating TLS connection and reports what was negotiated.
pub struct TlsInspector {
    config: Arc<ClientConfig>,
    timeout: Duration,
}

impl TlsInspector {
    /// Validates against the bundled Mozilla root set.
    pub fn new(timeout: Duration) -> Self {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        TlsInspector::with_roots(timeout, root_store)
    }

    pub fn with_roots(timeout: Duration, roots: RootCertStore) -> Self {
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        TlsInspector { config: Arc::new(config), timeout }
    }

    /// Never fails: any error becomes `valid: false` with its message.
    pub fn inspect(&self, hostname: &str, port: u16) -> TlsInfo {
        match self.try_inspect(hostname, port) {
            Ok(info) => info,
            Err(e) => {
                debug!("TLS inspection of {}:{} failed: {}", hostname, port, e);
                TlsInfo::failed(e.to_string())
            }
        }
    }

    pub fn try_inspect(&self, hostname: &str, port: u16) -> Result<TlsInfo, TlsError> {
        let host = hostname.trim_start_matches('[').trim_end_matches(']');

        let addr = resolve(host, port, self.timeout)?;
        let mut sock = TcpStream::connect_timeout(&addr, self.timeout).map_err(|source| TlsError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        let _ = sock.set_read_timeout(Some(self.timeout));
        let _ = sock.set_write_timeout(Some(self.timeout));

        let server_name =
            ServerName::try_from(host.to_string()).map_err(|_| TlsError::ServerName(host.to_string()))?;
        let mut conn = ClientConnection::new(Arc::clone(&self.config), server_name)?;

        while conn.is_handshaking() {
            conn.complete_io(&mut sock)
                .map_err(|e| TlsError::Handshake(e.to_string()))?;
        }

        let protocol = conn.protocol_version().map(|v| match v {
            rustls::ProtocolVersion::TLSv1_2 => "TLS 1.2".to_string(),
            rustls::ProtocolVersion::TLSv1_3 => "TLS 1.3".to_string(),
            other => format!("{:?}", other),
        });
        let cipher = conn
            .negotiated_cipher_suite()
            .map(|cs| format!("{:?}", cs.suite()));

        let leaf = conn
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or(TlsError::NoCertificate)?;
        let certificate = parse_certificate(leaf.as_ref())?;

        Ok(TlsInfo {
            valid: true,
            protocol,
            cipher,
            certificate: Some(certificate),
            error: None,
        })
    }
}

/// The system resolver has no deadline of its own, so the lookup runs on a
/// helper thread that is abandoned once `timeout` elapses.
fn resolve(host: &str, port: u16, timeout: Duration) -> Result<SocketAddr, TlsError> {
    let (tx, rx) = mpsc::channel();
    let name = host.to_string();
    thread::spawn(move || {
        let lookup = (name.as_str(), port).to_socket_addrs().map(|mut addrs| addrs.next());
        let _ = tx.send(lookup);
    });

    let lookup = rx.recv_timeout(timeout).unwrap_or_else(|_| {
        Err(io::Error::new(io::ErrorKind::TimedOut, "lookup timed out"))
    });
    lookup
        .map_err(|source| TlsError::Resolve { hostname: host.to_string(), source })?
        .ok_or_else(|| TlsError::NoAddress(host.to_string()))
}

fn parse_certificate(der: &[u8]) -> Result<CertificateInfo, TlsError> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| TlsError::Certificate(e.to_string()))?;

    let validity = cert.validity();
    let days_until_expiry = (validity.not_after.timestamp() - Utc::now().timestamp()) / 86400;

    let mut sans: Vec<String> = Vec::new();
    if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
        for name in &san_ext.value.general_names {
            match name {
                GeneralName::DNSName(dns) => sans.push(dns.to_string()),
                GeneralName::IPAddress(ip) => match ip.len() {
                    4 => sans.push(Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3]).to_string()),
                    16 => {
                        let mut octets = [0u8; 16];
                        octets.copy_from_slice(ip);
                        sans.push(Ipv6Addr::from(octets).to_string());
                    }
                    _ => {}
                },
                _ => {}
            }
        }
    }

    Ok(CertificateInfo {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        not_before: validity.not_before.to_rfc2822().unwrap_or_else(|_| "Unknown".to_string()),
        not_after: validity.not_after.to_rfc2822().unwrap_or_else(|_| "Unknown".to_string()),
        days_until_expiry,
        sans,
    })
}

impl TlsError {
    /// Handshake and certificate problems say something about the target;
    /// DNS and connect failures do not.
    pub fn is_certificate_problem(&self) -> bool {
        matches!(
            self,
            TlsError::Handshake(_) | TlsError::NoCertificate | TlsError::Certificate(_)
        )
    }
}

/// TLS_ISSUE findings for an https target.
pub fn audit(url: &str, outcome: &Result<TlsInfo, TlsError>, warn_days: i64, findings: &mut Findings) {
    match outcome {
        Err(e) if e.is_certificate_problem() => {
            let message = e.to_string();
            findings.record(
                Category::TlsIssue,
                url,
                Severity::High,
                evidence([("error", message.as_str())]),
            );
        }
        Err(_) => {}
        Ok(info) => {
            if let Some(cert) = &info.certificate {
                if cert.days_until_expiry <= warn_days {
                    let days = cert.days_until_expiry.to_string();
                    findings.record(
                        Category::TlsIssue,
                        url,
                        Severity::Low,
                        evidence([("days_until_expiry", days.as_str()), ("not_after", cert.not_after.as_str())]),
                    );
                }
            }
        }
    }
}
