use log::debug;
use url::Url;

use crate::html::{self, Tag};
use crate::models::{FormDescriptor, FormField, FormMethod};

const DECORATIVE_TYPES: &[&str] = &["submit", "button", "reset", "image"];

const TEXT_TYPES: &[&str] = &[
    "", "text", "search", "email", "url", "tel", "password", "hidden", "number",
];

const CSRF_MARKERS: &[&str] = &["csrf", "token"];

/// Resolves `action` against the page the form came from. Absolute URLs pass
/// through, `/path` joins the origin, anything else is page-relative and an
/// empty action means the page itself.
pub fn resolve_action(page_url: &Url, action: Option<&str>) -> Option<String> {
    let action = action.map(str::trim).unwrap_or("");
    if action.is_empty() {
        let mut same = page_url.clone();
        same.set_fragment(None);
        return Some(same.to_string());
    }
    page_url.join(action).ok().map(|u| u.to_string())
}

pub fn is_csrf_field(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    CSRF_MARKERS.iter().any(|m| lower.contains(m))
}

/// Every form with at least one named, non-decorative field. Malformed markup
/// yields whatever could be recovered, possibly nothing.
pub fn extract(page_html: &str, page_url: &str, placeholder: &str) -> Vec<FormDescriptor> {
    let base = match Url::parse(page_url) {
        Ok(u) => u,
        Err(e) => {
            debug!("cannot resolve forms against {}: {}", page_url, e);
            return Vec::new();
        }
    };

    let cleaned = html::strip_comments(page_html);
    let mut out = Vec::new();

    for block in html::forms(&cleaned) {
        let fields = collect_fields(block.inner, placeholder);
        if fields.is_empty() {
            debug!("skipping form without named fields on {}", page_url);
            continue;
        }

        let Some(action_url) = resolve_action(&base, block.tag.attr("action")) else {
            debug!("unresolvable form action {:?} on {}", block.tag.attr("action"), page_url);
            continue;
        };

        let has_csrf_token = fields.iter().any(|f| is_csrf_field(&f.name));
        out.push(FormDescriptor {
            action_url,
            method: FormMethod::parse(block.tag.attr("method")),
            fields,
            has_csrf_token,
        });
    }

    out
}

fn collect_fields(inner: &str, placeholder: &str) -> Vec<FormField> {
    let mut fields: Vec<FormField> = Vec::new();

    for tag in html::find_tags(inner, &["input", "textarea", "select"]) {
        let Some(name) = tag.attr("name").map(str::trim).filter(|n| !n.is_empty()) else {
            continue;
        };
        if fields.iter().any(|f| f.name == name) {
            continue;
        }
        if let Some(field) = classify(&tag, name, placeholder) {
            fields.push(field);
        }
    }

    fields
}

fn classify(tag: &Tag, name: &str, placeholder: &str) -> Option<FormField> {
    let own_value = tag.attr("value").filter(|v| !v.is_empty());

    let (value, probe) = match tag.name.as_str() {
        "textarea" => (placeholder.to_string(), true),
        "select" => (placeholder.to_string(), false),
        _ => {
            let kind = tag.attr("type").unwrap_or("").trim().to_ascii_lowercase();
            if DECORATIVE_TYPES.contains(&kind.as_str()) {
                return None;
            }
            if kind == "hidden" {
                // keep server-issued values such as tokens intact
                (own_value.unwrap_or(placeholder).to_string(), true)
            } else if TEXT_TYPES.contains(&kind.as_str()) {
                (placeholder.to_string(), true)
            } else {
                (own_value.unwrap_or(placeholder).to_string(), false)
            }
        }
    };

    Some(FormField { name: name.to_string(), value, probe })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "http://x.com/a/b";

    fn one(html: &str) -> FormDescriptor {
        let forms = extract(html, PAGE, "test");
        assert_eq!(forms.len(), 1, "expected exactly one form in {}", html);
        forms.into_iter().next().unwrap()
    }

    #[test]
    fn resolves_root_relative_action_against_origin() {
        let form = one(r#"<form action="/login"><input name="u"></form>"#);
        assert_eq!(form.action_url, "http://x.com/login");
    }

    #[test]
    fn resolves_relative_action_against_page() {
        let form = one(r#"<form action="profile"><input name="u"></form>"#);
        assert_eq!(form.action_url, "http://x.com/a/profile");
    }

    #[test]
    fn missing_action_means_page_itself() {
        let form = one(r#"<form><input name="u"></form>"#);
        assert_eq!(form.action_url, PAGE);
    }

    #[test]
    fn absolute_action_passes_through() {
        let form = one(r#"<form action="https://other.org/submit"><input name="u"></form>"#);
        assert_eq!(form.action_url, "https://other.org/submit");
    }

    #[test]
    fn method_defaults_to_get() {
        assert_eq!(one(r#"<form><input name="u"></form>"#).method, FormMethod::Get);
        assert_eq!(one(r#"<form method="DELETE"><input name="u"></form>"#).method, FormMethod::Get);
        assert_eq!(one(r#"<form method="post"><input name="u"></form>"#).method, FormMethod::Post);
    }

    #[test]
    fn detects_csrf_token_fields() {
        let with = one(r#"<form><input type="hidden" name="csrf_token" value="abc"><input name="q"></form>"#);
        assert!(with.has_csrf_token);
        assert_eq!(with.fields[0].value, "abc");

        let also = one(r#"<form><input type="hidden" name="authenticity_TOKEN"></form>"#);
        assert!(also.has_csrf_token);

        let without = one(r#"<form><input name="user"><input name="pass" type="password"></form>"#);
        assert!(!without.has_csrf_token);
    }

    #[test]
    fn drops_unnamed_and_decorative_fields() {
        let form = one(
            r#"<form>
                <input type="text">
                <input type="submit" name="go" value="Go">
                <button name="b">B</button>
                <input name="q">
                <textarea name="comment"></textarea>
                <select name="lang"><option>en</option></select>
                <input type="checkbox" name="remember" value="yes">
            </form>"#,
        );

        let names: Vec<&str> = form.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["q", "comment", "lang", "remember"]);

        let probed: Vec<&str> = form.fields.iter().filter(|f| f.probe).map(|f| f.name.as_str()).collect();
        assert_eq!(probed, vec!["q", "comment"]);
        assert_eq!(form.fields[3].value, "yes");
    }

    #[test]
    fn forms_without_named_fields_are_skipped() {
        let forms = extract(
            r#"<form action="/a"><input type="submit"></form><form action="/b"><input name="x"></form>"#,
            PAGE,
            "test",
        );
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].action_url, "http://x.com/b");
    }

    #[test]
    fn malformed_markup_degrades_gracefully() {
        assert!(extract("<form action=", PAGE, "test").is_empty());
        assert!(extract("", PAGE, "test").is_empty());
        assert!(extract("<form><input name=q>", "not a url", "test").is_empty());

        let forms = extract(r#"<div><form action="/s"><input name="q"></div>"#, PAGE, "test");
        assert_eq!(forms.len(), 1);
    }

    #[test]
    fn angle_bracket_in_quoted_attribute_keeps_fields() {
        let form = one(
            r#"<form><input placeholder="a > b" name="q"><input title='x>y' name="csrf_token" type="hidden" value="t"></form>"#,
        );
        let names: Vec<&str> = form.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["q", "csrf_token"]);
        assert!(form.has_csrf_token);
        assert_eq!(form.fields[1].value, "t");
    }

    #[test]
    fn commented_out_forms_are_ignored() {
        let forms = extract(r#"<!-- <form><input name="old"></form> -->"#, PAGE, "test");
        assert!(forms.is_empty());
    }
}
