use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::index::IndexEntry;
use crate::store::write_atomic;

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::Xml(e.to_string())
}

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Site pages that exist regardless of the dataset: path, changefreq, priority.
const STATIC_ROUTES: &[(&str, &str, &str)] = &[
    ("/", "weekly", "1.0"),
    ("/home", "weekly", "0.9"),
    ("/about", "monthly", "0.8"),
    ("/contact", "monthly", "0.8"),
    ("/company-list", "weekly", "0.9"),
    ("/sector-codes", "monthly", "0.7"),
    ("/privacy", "yearly", "0.3"),
    ("/terms", "yearly", "0.3"),
    ("/cookies", "yearly", "0.3"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapUrl {
    pub loc: String,
    pub lastmod: String,
    pub changefreq: &'static str,
    pub priority: &'static str,
}

/// Static routes followed by one `/company/<slug>` page per index entry.
pub fn sitemap_urls(site_url: &str, index: &[IndexEntry], today: NaiveDate) -> Vec<SitemapUrl> {
    let site = site_url.trim_end_matches('/');
    let lastmod = today.format("%Y-%m-%d").to_string();

    let statics = STATIC_ROUTES.iter().map(|&(path, changefreq, priority)| SitemapUrl {
        loc: format!("{}{}", site, path),
        lastmod: lastmod.clone(),
        changefreq,
        priority,
    });
    let companies = index
        .iter()
        .filter(|e| !e.slug.trim().is_empty())
        .map(|e| SitemapUrl {
            loc: format!("{}/company/{}", site, e.slug),
            lastmod: lastmod.clone(),
            changefreq: "monthly",
            priority: "0.6",
        });
    statics.chain(companies).collect()
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name))).map_err(xml_error)?;
    writer.write_event(Event::Text(BytesText::new(text))).map_err(xml_error)?;
    writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_error)?;
    Ok(())
}

pub fn render_sitemap(urls: &[SitemapUrl]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NS));
    writer.write_event(Event::Start(urlset)).map_err(xml_error)?;
    for url in urls {
        writer.write_event(Event::Start(BytesStart::new("url"))).map_err(xml_error)?;
        write_text_element(&mut writer, "loc", &url.loc)?;
        write_text_element(&mut writer, "lastmod", &url.lastmod)?;
        write_text_element(&mut writer, "changefreq", url.changefreq)?;
        write_text_element(&mut writer, "priority", url.priority)?;
        writer.write_event(Event::End(BytesEnd::new("url"))).map_err(xml_error)?;
    }
    writer.write_event(Event::End(BytesEnd::new("urlset"))).map_err(xml_error)?;

    let mut xml = String::from_utf8(writer.into_inner()).map_err(xml_error)?;
    xml.push('\n');
    Ok(xml)
}

/// Parse a urlset XML and return all <loc> URLs.
pub fn parse_urlset(xml: &str) -> Result<Vec<String>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut urls = Vec::new();
    let mut in_url = false;
    let mut in_loc = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"url" => in_url = true,
                b"loc" if in_url => in_loc = true,
                _ => {}
            },
            Ok(Event::Text(e)) if in_loc => {
                urls.push(e.unescape().map_err(xml_error)?.trim().to_string());
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"loc" => in_loc = false,
                b"url" => in_url = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }
    Ok(urls)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapDiff {
    pub added: usize,
    pub removed: usize,
}

pub fn diff(previous: &[String], current: &[SitemapUrl]) -> SitemapDiff {
    let old: HashSet<&str> = previous.iter().map(String::as_str).collect();
    let new: HashSet<&str> = current.iter().map(|u| u.loc.as_str()).collect();
    SitemapDiff {
        added: new.difference(&old).count(),
        removed: old.difference(&new).count(),
    }
}

#[derive(Debug)]
pub struct SitemapReport {
    pub total: usize,
    pub static_pages: usize,
    pub company_pages: usize,
    /// `None` when there was no readable previous sitemap.
    pub changes: Option<SitemapDiff>,
}

/// Regenerate the sitemap at `out` from the index entries.
pub fn generate(site_url: &str, index: &[IndexEntry], out: &Path, today: NaiveDate) -> Result<SitemapReport> {
    let urls = sitemap_urls(site_url, index, today);

    let changes = match std::fs::read_to_string(out) {
        Ok(previous) => match parse_urlset(&previous) {
            Ok(old) => Some(diff(&old, &urls)),
            Err(e) => {
                warn!(path = %out.display(), error = %e, "previous sitemap unreadable");
                None
            }
        },
        Err(_) => None,
    };

    let xml = render_sitemap(&urls)?;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| Error::Write {
            path: parent.into(),
            source,
        })?;
    }
    write_atomic(out, xml.as_bytes())?;
    info!(path = %out.display(), urls = urls.len(), "sitemap written");

    Ok(SitemapReport {
        total: urls.len(),
        static_pages: STATIC_ROUTES.len(),
        company_pages: urls.len() - STATIC_ROUTES.len(),
        changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(slug: &str) -> IndexEntry {
        IndexEntry {
            slug: slug.into(),
            name: slug.into(),
            web: String::new(),
            logo: format!("img/company/{}.svg", slug),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn static_routes_then_companies() {
        let urls = sitemap_urls("https://bufirmanasil.com.tr/", &[entry("acme"), entry("")], day());
        assert_eq!(urls.len(), 10);
        assert_eq!(urls[0].loc, "https://bufirmanasil.com.tr/");
        assert_eq!(urls[0].priority, "1.0");
        let company = urls.last().unwrap();
        assert_eq!(company.loc, "https://bufirmanasil.com.tr/company/acme");
        assert_eq!(company.changefreq, "monthly");
        assert_eq!(company.priority, "0.6");
        assert_eq!(company.lastmod, "2024-03-15");
    }

    #[test]
    fn rendered_sitemap_parses_back() {
        let urls = sitemap_urls("https://bufirmanasil.com.tr", &[entry("acme"), entry("beta")], day());
        let xml = render_sitemap(&urls).unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains("<lastmod>2024-03-15</lastmod>"));

        let locs = parse_urlset(&xml).unwrap();
        assert_eq!(locs.len(), 11);
        assert_eq!(locs[9], "https://bufirmanasil.com.tr/company/acme");
    }

    #[test]
    fn malformed_previous_sitemap_is_an_xml_error() {
        let err = parse_urlset("<urlset><url><loc>a</loc></url></wrong>").unwrap_err();
        assert_eq!(err.reason(), "xml");
    }

    #[test]
    fn generate_reports_changes_against_previous() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("docs/sitemap.xml");

        let first = generate("https://bufirmanasil.com.tr", &[entry("acme"), entry("eski")], &out, day()).unwrap();
        assert_eq!(first.total, 11);
        assert_eq!(first.changes, None);

        let second = generate("https://bufirmanasil.com.tr", &[entry("acme"), entry("yeni"), entry("zeta")], &out, day()).unwrap();
        assert_eq!(second.company_pages, 3);
        assert_eq!(second.changes, Some(SitemapDiff { added: 2, removed: 1 }));
    }
}
