use std::collections::{BTreeSet, HashMap};

use lazy_static::lazy_static;
use regex::Regex;

use crate::html;

// technology => patterns, matched case-insensitively against headers and body
const TECH_PATTERNS: &[(&str, &[&str])] = &[
    ("Apache", &[r"server: apache", r"apache/\d"]),
    ("Nginx", &[r"server: nginx", r"nginx/\d"]),
    ("IIS", &[r"server: microsoft-iis"]),
    ("LiteSpeed", &[r"server: litespeed"]),
    ("Cloudflare", &[r"server: cloudflare", r"cf-ray: "]),
    ("PHP", &[r"x-powered-by: php", r"phpsessid", r"\.php\b"]),
    ("ASP.NET", &[r"x-aspnet-version", r"x-powered-by: asp\.net", r"__viewstate"]),
    ("Express", &[r"x-powered-by: express"]),
    ("WordPress", &[r"/wp-content/", r"/wp-includes/", r#"content=["']wordpress"#]),
    ("Joomla", &[r"/components/com_", r#"content=["']joomla"#]),
    ("Drupal", &[r"drupal\.settings", r"/sites/all/", r"x-drupal-cache", r"x-generator: drupal"]),
    ("Laravel", &[r"laravel_session", r"x-xsrf-token"]),
    ("Django", &[r"csrfmiddlewaretoken", r"djdt", r"__admin_media_prefix__"]),
    ("Spring", &[r"x-application-context", r"org\.springframework"]),
    ("Ruby on Rails", &[r"x-runtime: ", r"csrf-param.*authenticity_token", r"_rails_session"]),
    ("Flask", &[r"server: werkzeug"]),
    ("jQuery", &[r"jquery(\.min)?\.js", r"jquery-\d"]),
    ("Bootstrap", &[r"bootstrap(\.min)?\.(css|js)"]),
    ("React", &[r"data-reactroot", r"react(-dom)?(\.production)?(\.min)?\.js", r"__next_data__"]),
    ("Angular", &[r"ng-version=", r"ng-app", r"angular(\.min)?\.js"]),
    ("Vue.js", &[r"data-v-[0-9a-f]{6,}", r"vue(\.min)?\.js", r"__vue__"]),
];

lazy_static! {
    static ref TECH_FINGERPRINTS: Vec<(&'static str, Vec<Regex>)> = TECH_PATTERNS
        .iter()
        .map(|(name, patterns)| {
            let compiled = patterns
                .iter()
                .filter_map(|p| Regex::new(&format!("(?i){}", p)).ok())
                .collect();
            (*name, compiled)
        })
        .collect();
}

/// Pure: the same headers and body always yield the same set.
pub fn identify(headers: &HashMap<String, String>, body: &str) -> BTreeSet<String> {
    let header_text = headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n");

    let mut found: BTreeSet<String> = TECH_FINGERPRINTS
        .iter()
        .filter(|(_, patterns)| {
            patterns
                .iter()
                .any(|re| re.is_match(&header_text) || re.is_match(body))
        })
        .map(|(name, _)| name.to_string())
        .collect();

    if let Some(generator) = meta_generator(body) {
        found.insert(format!("Generator: {}", generator));
    }

    found
}

fn meta_generator(body: &str) -> Option<String> {
    html::find_tags(body, &["meta"])
        .into_iter()
        .find(|tag| {
            tag.attr("name")
                .map(|n| n.eq_ignore_ascii_case("generator"))
                .unwrap_or(false)
        })
        .and_then(|tag| tag.attr("content").map(|c| c.trim().to_string()))
        .filter(|c| !c.is_empty())
}
