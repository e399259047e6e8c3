//! Best-effort field extraction from raw HTML.
//!
//! Every field is an ordered list of pure strategies over a parsed document.
//! The first strategy that yields a non-empty value wins. Strategies never
//! fail: a bad selector, an unparsable JSON-LD block or a malformed URL just
//! produces `None` for that strategy.

pub mod logo;
pub mod profile;
pub mod social;

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::record::Field;

/// Extracted values keyed by the record field they would fill.
pub type Extracted = BTreeMap<Field, String>;

/// A parsed document together with the URL relative links resolve against.
pub struct Source<'a> {
    pub doc: &'a Html,
    pub base: &'a Url,
}

/// A named strategy for fields that need nothing beyond the document.
pub type Strategy = (&'static str, fn(&Source<'_>) -> Option<String>);

/// Evaluate `strategies` in order and return the first non-empty result.
pub fn first_match<S>(
    strategies: &[(&'static str, S)],
    mut run: impl FnMut(&S) -> Option<String>,
) -> Option<String> {
    strategies.iter().find_map(|(name, strategy)| {
        let value = run(strategy)?;
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        debug!(strategy = *name, value, "strategy matched");
        Some(value.to_string())
    })
}

pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!(css, error = ?e, "invalid selector skipped");
            None
        }
    }
}

/// Non-empty attribute of the first element matching `css`.
pub fn first_attr(doc: &Html, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css)?;
    doc.select(&sel)
        .find_map(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// `content` of `<meta property=key>` or `<meta name=key>`.
pub fn meta_content(doc: &Html, key: &str) -> Option<String> {
    first_attr(doc, &format!(r#"meta[property="{}"]"#, key), "content")
        .or_else(|| first_attr(doc, &format!(r#"meta[name="{}"]"#, key), "content"))
}

/// Whitespace-collapsed text content of an element.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve `href` against `base`. Script, mail, phone, data and
/// fragment-only links are not URLs we want to record.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    let lower = href.to_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || ["javascript:", "mailto:", "tel:", "data:"]
            .iter()
            .any(|p| lower.starts_with(p))
    {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

/// All JSON-LD objects in the page, flattening top-level arrays and `@graph`.
pub fn json_ld_objects(doc: &Html) -> Vec<Value> {
    let Some(sel) = selector(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };
    let mut objects = Vec::new();
    for script in doc.select(&sel) {
        let raw: String = script.text().collect();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => flatten_json_ld(value, &mut objects),
            Err(e) => debug!(error = %e, "skipping malformed JSON-LD block"),
        }
    }
    objects
}

fn flatten_json_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|v| flatten_json_ld(v, out)),
        Value::Object(mut obj) => {
            if let Some(graph) = obj.remove("@graph") {
                flatten_json_ld(graph, out);
            }
            out.push(Value::Object(obj));
        }
        _ => {}
    }
}

/// True when a JSON-LD object's `@type` is, or includes, `ty`.
pub fn json_ld_is(obj: &Value, ty: &str) -> bool {
    match obj.get("@type") {
        Some(Value::String(t)) => t.eq_ignore_ascii_case(ty),
        Some(Value::Array(ts)) => ts
            .iter()
            .filter_map(Value::as_str)
            .any(|t| t.eq_ignore_ascii_case(ty)),
        _ => false,
    }
}

/// Visible text split into trimmed, non-empty lines (script and style
/// contents excluded).
pub fn text_lines(doc: &Html) -> Vec<String> {
    doc.root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .parent()
                .and_then(ElementRef::wrap)
                .is_some_and(|p| matches!(p.value().name(), "script" | "style" | "noscript"));
            if hidden {
                None
            } else {
                Some(str::to_owned(text))
            }
        })
        .flat_map(|t| {
            t.lines()
                .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://firma.com.tr/tr/").unwrap()
    }

    #[test]
    fn first_match_skips_blank_results() {
        let strategies: [(&str, fn() -> Option<String>); 3] = [
            ("none", || None),
            ("blank", || Some("   ".into())),
            ("hit", || Some(" value ".into())),
        ];
        assert_eq!(first_match(&strategies, |f| f()), Some("value".into()));
    }

    #[test]
    fn resolve_relative_and_reject_non_links() {
        let b = base();
        assert_eq!(
            resolve_url(&b, "/img/logo.svg").as_deref(),
            Some("https://firma.com.tr/img/logo.svg")
        );
        assert_eq!(
            resolve_url(&b, "logo.png").as_deref(),
            Some("https://firma.com.tr/tr/logo.png")
        );
        assert_eq!(resolve_url(&b, "mailto:info@firma.com.tr"), None);
        assert_eq!(resolve_url(&b, "javascript:void(0)"), None);
        assert_eq!(resolve_url(&b, "#top"), None);
    }

    #[test]
    fn malformed_json_ld_is_skipped() {
        let doc = Html::parse_document(
            r#"<script type="application/ld+json">{ broken</script>
               <script type="application/ld+json">{"@graph":[{"@type":"Organization","name":"Acme"}]}</script>"#,
        );
        let objects = json_ld_objects(&doc);
        assert!(objects.iter().any(|o| json_ld_is(o, "Organization")));
    }

    #[test]
    fn text_lines_ignore_scripts() {
        let doc = Html::parse_document(
            "<body><p>Company size</p><script>var x = 1;</script><p>11-50   employees</p></body>",
        );
        assert_eq!(text_lines(&doc), vec!["Company size", "11-50 employees"]);
    }

    #[test]
    fn meta_by_property_or_name() {
        let doc = Html::parse_document(
            r#"<head><meta property="og:title" content="Acme"><meta name="twitter:site" content="@acme"></head>"#,
        );
        assert_eq!(meta_content(&doc, "og:title").as_deref(), Some("Acme"));
        assert_eq!(meta_content(&doc, "twitter:site").as_deref(), Some("@acme"));
        assert_eq!(meta_content(&doc, "og:image"), None);
    }
}
