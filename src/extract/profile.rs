use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::Value;
use url::Url;

use super::{
    element_text, first_match, json_ld_is, json_ld_objects, meta_content, selector, text_lines,
    Extracted, Source, Strategy,
};
use crate::record::Field;

/// Follower-count prefixes LinkedIn puts in front of the description, in
/// Turkish and English.
static FOLLOWER_PREFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^.*?\|\s*LinkedIn'de\s+[\d.,]+\s*[BKMbkm]?\s+takipçi\s*",
        r"(?i)^LinkedIn'de\s+[\d.,]+\s*[BKMbkm]?\s+takipçi\s*",
        r"(?i)^.*?\|\s*[\d.,]+\s*[KMB]?\s+followers?\s+on\s+LinkedIn\.?\s*",
        r"(?i)^.*?\|\s*LinkedIn'de\s+[\d.,]+\s+followers?\s*",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?](\s|$)").unwrap());

static EMPLOYEES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d.,]*\s*[-–]\s*\d[\d.,]*|\d[\d.,]*\+?)\s*(employees|çalışan)").unwrap()
});

const SECTOR_LABELS: &[&str] = &["Industry", "Sektör"];
const SIZE_LABELS: &[&str] = &["Company size", "Şirket büyüklüğü"];
const HQ_LABELS: &[&str] = &["Headquarters", "Genel merkez"];
const WEB_LABELS: &[&str] = &["Website", "Web sitesi"];

const NAME: &[Strategy] = &[
    ("og-title", og_title),
    ("title", title_tag),
    ("json-ld-name", json_ld_name),
];

const ABOUT: &[Strategy] = &[
    ("og-description", og_description),
    ("meta-description", meta_description),
    ("json-ld-description", json_ld_description),
];

const TAGLINE: &[Strategy] = &[("second-subline", second_subline)];

const SECTOR: &[Strategy] = &[("headline", headline), ("industry-label", industry)];

const COMPANY_SIZE: &[Strategy] = &[("size-label", company_size)];

const HEADQUARTERS: &[Strategy] = &[("headquarters-label", headquarters)];

const WEBSITE: &[Strategy] = &[("website-label", website)];

fn og_title(s: &Source<'_>) -> Option<String> {
    meta_content(s.doc, "og:title").map(|t| before_pipe(&t))
}

fn title_tag(s: &Source<'_>) -> Option<String> {
    heading_text(s.doc, "title").map(|t| before_pipe(&t))
}

fn og_description(s: &Source<'_>) -> Option<String> {
    meta_content(s.doc, "og:description").map(|d| clean_about(&d))
}

fn meta_description(s: &Source<'_>) -> Option<String> {
    meta_content(s.doc, "description").map(|d| clean_about(&d))
}

fn json_ld_name(s: &Source<'_>) -> Option<String> {
    organization_field(s.doc, "name")
}

fn json_ld_description(s: &Source<'_>) -> Option<String> {
    organization_field(s.doc, "description")
}

fn second_subline(s: &Source<'_>) -> Option<String> {
    heading_text(s.doc, "h4.top-card-layout__second-subline").filter(|t| t.chars().count() > 5)
}

fn headline(s: &Source<'_>) -> Option<String> {
    heading_text(s.doc, r#"h2[class*="top-card-layout__headline"]"#).filter(|t| {
        let n = t.chars().count();
        n > 5 && n < 200
    })
}

fn industry(s: &Source<'_>) -> Option<String> {
    labelled(s.doc, SECTOR_LABELS)
}

fn company_size(s: &Source<'_>) -> Option<String> {
    let value = labelled(s.doc, SIZE_LABELS)?;
    Some(
        EMPLOYEES
            .captures(&value)
            .map(|c| c[0].to_string())
            .unwrap_or(value),
    )
}

fn headquarters(s: &Source<'_>) -> Option<String> {
    labelled(s.doc, HQ_LABELS)
}

fn website(s: &Source<'_>) -> Option<String> {
    let value = labelled(s.doc, WEB_LABELS)?;
    let candidate = value.split_whitespace().next()?.to_string();
    candidate.contains('.').then_some(candidate)
}

fn before_pipe(text: &str) -> String {
    text.split('|').next().unwrap_or_default().trim().to_string()
}

fn clean_about(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    for re in FOLLOWER_PREFIXES.iter() {
        if re.is_match(&text) {
            text = re.replace(&text, "").into_owned();
            break;
        }
    }
    if let Some(idx) = text.find(" | LinkedIn") {
        text.truncate(idx);
    }
    text.trim().to_string()
}

/// First sentence of the description, when it reads like a slogan.
fn tagline_from_about(about: &str) -> Option<String> {
    let first = about.split('|').next().unwrap_or_default();
    let sentence = match SENTENCE_END.find(first) {
        Some(m) => &first[..m.start() + 1],
        None => first,
    };
    let sentence = sentence.trim();
    let len = sentence.chars().count();
    (len > 10 && len < 200).then(|| sentence.to_string())
}

fn heading_text(doc: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    doc.select(&sel)
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
}

fn organization_field(doc: &Html, key: &str) -> Option<String> {
    json_ld_objects(doc)
        .iter()
        .filter(|o| json_ld_is(o, "Organization") || json_ld_is(o, "Corporation"))
        .find_map(|o| o.get(key).and_then(Value::as_str).map(str::to_string))
}

fn label_matches(text: &str, labels: &[&str]) -> bool {
    let text = text.trim().trim_end_matches(':').trim().to_lowercase();
    labels.iter().any(|l| text == l.to_lowercase())
}

/// Value for a label in a `<dt>/<dd>` list, falling back to the line after
/// (or after the colon of) a matching line of visible text.
fn labelled(doc: &Html, labels: &[&str]) -> Option<String> {
    if let Some(dt) = selector("dt") {
        let found = doc.select(&dt).find_map(|term| {
            if !label_matches(&element_text(&term), labels) {
                return None;
            }
            term.next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "dd")
                .map(|dd| element_text(&dd))
                .filter(|v| !v.is_empty())
        });
        if found.is_some() {
            return found;
        }
    }

    let lines = text_lines(doc);
    lines.iter().enumerate().find_map(|(i, line)| {
        if label_matches(line, labels) {
            return lines.get(i + 1).cloned();
        }
        let (label, value) = line.split_once(':')?;
        (label_matches(label, labels) && !value.trim().is_empty()).then(|| value.trim().to_string())
    })
}

/// Descriptive fields scraped from a public LinkedIn company page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub name: Option<String>,
    pub tagline: Option<String>,
    pub about: Option<String>,
    pub sector: Option<String>,
    pub company_size: Option<String>,
    pub headquarters: Option<String>,
    pub website: Option<String>,
}

impl Profile {
    pub fn is_empty(&self) -> bool {
        *self == Profile::default()
    }

    pub fn into_extracted(self) -> Extracted {
        [
            (Field::Name, self.name),
            (Field::Tagline, self.tagline),
            (Field::About, self.about),
            (Field::Sector, self.sector),
            (Field::CompanySize, self.company_size),
            (Field::Headquarters, self.headquarters),
            (Field::Web, self.website),
        ]
        .into_iter()
        .filter_map(|(field, value)| Some((field, value?)))
        .collect()
    }
}

pub fn extract_profile(html: &str, page_url: &str) -> Profile {
    let doc = Html::parse_document(html);
    let base = Url::parse(page_url)
        .or_else(|_| Url::parse("https://www.linkedin.com/"))
        .ok();
    let Some(base) = base else {
        return Profile::default();
    };
    let src = Source {
        doc: &doc,
        base: &base,
    };
    let run = |strategies: &[Strategy]| first_match(strategies, |f| f(&src));

    let about = run(ABOUT);
    let tagline = run(TAGLINE).or_else(|| about.as_deref().and_then(tagline_from_about));
    Profile {
        name: run(NAME),
        tagline,
        about,
        sector: run(SECTOR),
        company_size: run(COMPANY_SIZE),
        headquarters: run(HEADQUARTERS),
        website: run(WEBSITE),
    }
}
