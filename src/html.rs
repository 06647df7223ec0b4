//! Lenient tag scanner. Not a full HTML parser: enough to enumerate elements
//! by name and read their attributes from real-world (often malformed) pages.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

// Attribute text up to the closing `>`; a `>` inside a quoted value does not
// end the tag. A stray quote is taken literally.
const TAG_BODY: &str = r#"(?:[^>"']|"[^"]*"|'[^']*'|["'])*"#;

lazy_static! {
    static ref ATTR: Regex = Regex::new(
        r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#
    )
    .unwrap();
    static ref FORM_OPEN: Regex = Regex::new(&format!(r"(?is)<form\b({})>", TAG_BODY)).unwrap();
    static ref FORM_CLOSE: Regex = Regex::new(r"(?i)</form\s*>").unwrap();
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub attrs: HashMap<String, String>,
}

impl Tag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

/// A `<form>` element: its own attributes plus the markup it encloses.
#[derive(Debug, Clone)]
pub struct FormBlock<'a> {
    pub tag: Tag,
    pub inner: &'a str,
}

/// All opening tags named one of `names`, in document order.
pub fn find_tags(html: &str, names: &[&str]) -> Vec<Tag> {
    let alternation = names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    let re = match Regex::new(&format!(r"(?is)<({})\b({})>", alternation, TAG_BODY)) {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };

    re.captures_iter(html)
        .map(|cap| Tag {
            name: cap[1].to_ascii_lowercase(),
            attrs: parse_attrs(&cap[2]),
        })
        .collect()
}

/// Every form in the page. An unclosed form runs to the next `<form` or EOF.
pub fn forms(html: &str) -> Vec<FormBlock<'_>> {
    let opens: Vec<_> = FORM_OPEN.captures_iter(html).collect();
    let mut blocks = Vec::with_capacity(opens.len());

    for (i, cap) in opens.iter().enumerate() {
        let (Some(whole), Some(attrs)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let limit = opens
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(html.len());
        let rest = &html[whole.end()..limit];
        let inner = match FORM_CLOSE.find(rest) {
            Some(close) => &rest[..close.start()],
            None => rest,
        };

        blocks.push(FormBlock {
            tag: Tag { name: "form".to_string(), attrs: parse_attrs(attrs.as_str()) },
            inner,
        });
    }
    blocks
}

pub fn strip_comments(html: &str) -> std::borrow::Cow<'_, str> {
    COMMENT.replace_all(html, "")
}

/// Attribute names are lower-cased; the first occurrence of a name wins.
pub fn parse_attrs(raw: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for cap in ATTR.captures_iter(raw) {
        let name = cap[1].to_ascii_lowercase();
        let value = cap
            .get(2)
            .or_else(|| cap.get(3))
            .or_else(|| cap.get(4))
            .map(|m| decode_entities(m.as_str()))
            .unwrap_or_default();
        attrs.entry(name).or_insert(value);
    }
    attrs
}

pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#x2F;", "/")
        .replace("&#47;", "/")
        .replace("&amp;", "&")
}
