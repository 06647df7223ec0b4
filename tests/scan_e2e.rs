// ---------------------------------------------------------------------------
// End-to-end scans against a throwaway HTTP server on 127.0.0.1
// ---------------------------------------------------------------------------

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use url::Url;
use webprobe::{Category, ScanConfig, Scanner, Severity};

type Reply = (u16, Vec<(&'static str, &'static str)>, String);

/// Serves every connection on its own thread until the test process exits.
fn serve<F>(handler: F) -> SocketAddr
where
    F: Fn(&str, &str, &str) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            let handler = Arc::clone(&handler);
            thread::spawn(move || {
                let _ = handle(stream, handler.as_ref());
            });
        }
    });

    addr
}

fn handle<F>(mut stream: TcpStream, handler: &F) -> std::io::Result<()>
where
    F: Fn(&str, &str, &str) -> Reply,
{
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("/").to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    let body = String::from_utf8_lossy(&body).into_owned();

    let (status, headers, payload) = handler(&method, &target, &body);
    let mut response = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        payload.len()
    );
    for (name, value) in headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    response.push_str(&payload);

    stream.write_all(response.as_bytes())?;
    stream.flush()
}

fn form_value(body: &str, field: &str) -> Option<String> {
    url::form_urlencoded::parse(body.as_bytes())
        .find(|(k, _)| k == field)
        .map(|(_, v)| v.into_owned())
}

fn query_value(target: &str, field: &str) -> Option<String> {
    let url = Url::parse(&format!("http://localhost{}", target)).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == field)
        .map(|(_, v)| v.into_owned())
}

fn not_found() -> Reply {
    (404, vec![], "<h1>404 Not Found</h1>".to_string())
}

fn scanner() -> Scanner<webprobe::ReqwestClient> {
    let config = ScanConfig {
        request_timeout: Duration::from_secs(3),
        tls_timeout: Duration::from_secs(2),
        ..ScanConfig::default()
    };
    Scanner::from_config(config).unwrap()
}

const LOGIN_PAGE: &str = r#"<!doctype html>
<html><body>
  <form action="/login" method="post">
    <input type="text" name="username">
    <input type="password" name="password">
    <input type="submit" value="Sign in">
  </form>
</body></html>"#;

#[test]
fn csrf_missing_form_and_exposed_env_score_forty() {
    let addr = serve(|method, target, _| match (method, target) {
        ("GET", "/") => (200, vec![], LOGIN_PAGE.to_string()),
        ("POST", "/login") => (200, vec![], "<p>Invalid credentials</p>".to_string()),
        ("GET", "/.env") => (200, vec![], "APP_ENV=production\nDB_PASSWORD=s3cret\n".to_string()),
        _ => not_found(),
    });

    let result = scanner().scan(&format!("http://{}/", addr));

    assert_eq!(result.http_status, 200);
    assert_eq!(result.security_headers.len(), 7);
    assert!(result.security_headers.values().all(|present| !present));
    assert_eq!(result.forms_found, 1);
    assert!(result.count_by(Category::CsrfMissing) >= 1);
    assert!(result
        .vulnerabilities
        .iter()
        .any(|v| v.category == Category::SensitiveFile && v.severity == Severity::High));
    assert_eq!(result.security_score, 100 - 7 * 5 - 10 - 15);
    assert!(!result.tls_info.valid);
}

#[test]
fn present_headers_are_not_charged() {
    let addr = serve(|method, target, _| match (method, target) {
        ("GET", "/") => (
            200,
            vec![
                ("Strict-Transport-Security", "max-age=63072000"),
                ("content-security-policy", "default-src 'self'"),
                ("X-Content-Type-Options", "nosniff"),
                ("X-Frame-Options", "DENY"),
                ("X-XSS-Protection", "0"),
                ("Referrer-Policy", "no-referrer"),
                ("Feature-Policy", "camera 'none'"),
                ("Server", "nginx/1.25.3"),
            ],
            "<html><body>static</body></html>".to_string(),
        ),
        _ => not_found(),
    });

    let result = scanner().scan(&format!("http://{}/", addr));

    assert!(result.security_headers.values().all(|present| *present));
    assert!(result.vulnerabilities.is_empty());
    assert_eq!(result.security_score, 100);
    assert!(result.technologies.contains("Nginx"));
}

#[test]
fn reflected_query_parameter_is_reported() {
    let addr = serve(|method, target, _| {
        if method == "GET" && target.starts_with("/search") {
            let q = query_value(target, "q").unwrap_or_default();
            (200, vec![], format!("<h2>Results for {}</h2>", q))
        } else {
            not_found()
        }
    });

    let result = scanner().scan(&format!("http://{}/search?q=1", addr));

    let xss: Vec<_> = result
        .vulnerabilities
        .iter()
        .filter(|v| v.category == Category::XssReflected)
        .collect();
    assert!(!xss.is_empty());
    assert_eq!(xss[0].evidence["field"], "q");
}

#[test]
fn leaked_sql_error_reported_once_per_field() {
    let addr = serve(|method, target, body| match (method, target) {
        ("GET", "/") => (200, vec![], LOGIN_PAGE.to_string()),
        ("POST", "/login") => {
            let user = form_value(body, "username").unwrap_or_default();
            if user.contains('\'') {
                (500, vec![], "Error: You have an error in your SQL syntax near ''".to_string())
            } else {
                (200, vec![], "<p>Invalid credentials</p>".to_string())
            }
        }
        _ => not_found(),
    });

    let result = scanner().scan(&format!("http://{}/", addr));

    let sqli: Vec<_> = result
        .vulnerabilities
        .iter()
        .filter(|v| v.category == Category::SqlInjection)
        .collect();
    assert_eq!(sqli.len(), 1);
    assert_eq!(sqli[0].evidence["field"], "username");
    assert_eq!(sqli[0].severity, Severity::Critical);
}

#[test]
fn batch_scan_survives_dead_targets() {
    let live = serve(|_, _, _| (200, vec![], "<html>ok</html>".to_string()));

    // grab a free port, then close it so connections are refused
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let urls = vec![
        format!("http://{}/", live),
        format!("http://{}/", dead),
        "not-a-url".to_string(),
    ];
    let results = scanner().scan_many(&urls, 3).unwrap();

    assert_eq!(results.len(), 3);
    let dead_result = results.iter().find(|r| r.url == urls[1]).unwrap();
    assert_eq!(dead_result.http_status, 0);
    assert_eq!(dead_result.security_score, 0);
    assert!(dead_result.vulnerabilities.is_empty());
    assert!(!dead_result.tls_info.valid);

    let live_result = results.iter().find(|r| r.url == urls[0]).unwrap();
    assert_eq!(live_result.http_status, 200);
}

#[test]
fn oversized_exposed_file_is_judged_on_its_prefix() {
    let dump = "INSERT INTO users VALUES (1,'admin','5f4dcc3b5aa765d61d8327deb882cf99');\n".repeat(50_000);
    let addr = serve(move |method, target, _| match (method, target) {
        ("GET", "/") => (200, vec![], "<html><body>home</body></html>".to_string()),
        ("GET", "/backup.sql") => (200, vec![], dump.clone()),
        _ => not_found(),
    });

    let config = ScanConfig {
        request_timeout: Duration::from_secs(3),
        max_body_bytes: 64 * 1024,
        sensitive_paths: vec!["/backup.sql".to_string(), "/.env".to_string()],
        ..ScanConfig::default()
    };
    let result = Scanner::from_config(config).unwrap().scan(&format!("http://{}/", addr));

    let exposed: Vec<_> = result
        .vulnerabilities
        .iter()
        .filter(|v| v.category == Category::SensitiveFile)
        .collect();
    assert_eq!(exposed.len(), 1);
    assert!(exposed[0].target_url.ends_with("/backup.sql"));
    assert_eq!(exposed[0].severity, Severity::High);
    assert_eq!(exposed[0].evidence["bytes"], (64 * 1024).to_string());
}
