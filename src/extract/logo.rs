use scraper::Html;
use tracing::debug;

use super::{first_attr, first_match, meta_content, resolve_url, selector, Source, Strategy};
use crate::fetch::normalize_url;

const SVG_LOGO: &[&str] = &[
    r#"img[src*=".svg"][class*="logo"]"#,
    r#"img[src*=".svg"][id*="logo"]"#,
    r#"img[src*="logo"][src*=".svg"]"#,
    r#"a[class*="logo"] img[src*=".svg"]"#,
];

const LOGO_IMAGE: &[&str] = &[
    r#"img[class*="logo"]"#,
    r#"img[id*="logo"]"#,
    r#"img[alt*="logo"]"#,
    r#"img[alt*="Logo"]"#,
    ".logo img",
    "#logo img",
    ".site-logo img",
    ".brand img",
    ".navbar-brand img",
    r#"header img[class*="logo"]"#,
    r#"nav img[class*="logo"]"#,
];

/// Paths tried on the site root when the page yields nothing downloadable.
pub const FALLBACK_PATHS: &[&str] = &[
    "/logo.png",
    "/logo.svg",
    "/assets/logo.png",
    "/images/logo.png",
    "/img/logo.png",
];

const STRATEGIES: &[Strategy] = &[
    ("svg-logo", svg_logo),
    ("logo-image", logo_image),
    ("og-image", og_image),
    ("twitter-image", twitter_image),
    ("apple-touch-icon", apple_touch_icon),
    ("icon-link", icon_link),
    ("favicon", favicon),
];

/// First usable image source of the first element matching each selector.
fn image_from(src: &Source<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let sel = selector(css)?;
        let img = src.doc.select(&sel).next()?;
        ["src", "data-src"].into_iter().find_map(|attr| {
            let value = img.value().attr(attr)?.trim();
            if value.is_empty() || value.starts_with("data:") || value.contains("placeholder") {
                return None;
            }
            resolve_url(src.base, value)
        })
    })
}

fn svg_logo(src: &Source<'_>) -> Option<String> {
    image_from(src, SVG_LOGO)
}

fn logo_image(src: &Source<'_>) -> Option<String> {
    image_from(src, LOGO_IMAGE)
}

fn og_image(src: &Source<'_>) -> Option<String> {
    resolve_url(src.base, &meta_content(src.doc, "og:image")?)
}

fn twitter_image(src: &Source<'_>) -> Option<String> {
    resolve_url(src.base, &meta_content(src.doc, "twitter:image")?)
}

fn apple_touch_icon(src: &Source<'_>) -> Option<String> {
    resolve_url(src.base, &first_attr(src.doc, r#"link[rel~="apple-touch-icon"]"#, "href")?)
}

fn icon_link(src: &Source<'_>) -> Option<String> {
    resolve_url(src.base, &first_attr(src.doc, r#"link[rel~="icon"]"#, "href")?)
}

fn favicon(src: &Source<'_>) -> Option<String> {
    resolve_url(src.base, "/favicon.ico")
}

/// Best logo URL on the page. Only `None` when the base URL is unusable,
/// since the favicon fallback always applies.
pub fn find_logo_url(html: &str, base_url: &str) -> Option<String> {
    let base = match normalize_url(base_url) {
        Ok(url) => url,
        Err(e) => {
            debug!(error = %e, "unusable base URL");
            return None;
        }
    };
    let doc = Html::parse_document(html);
    let src = Source {
        doc: &doc,
        base: &base,
    };
    first_match(STRATEGIES, |f| f(&src))
}

/// File extension for a downloaded logo: from the content type, else the URL
/// path, else `png`.
pub fn logo_extension(content_type: Option<&str>, url: &str) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_lowercase())
        .unwrap_or_default();
    let from_mime = match mime.as_str() {
        "image/svg+xml" => Some("svg"),
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/x-icon" | "image/vnd.microsoft.icon" => Some("ico"),
        _ => None,
    };
    if let Some(ext) = from_mime {
        return ext;
    }

    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_lowercase();
    [
        (".svg", "svg"),
        (".png", "png"),
        (".jpeg", "jpg"),
        (".jpg", "jpg"),
        (".webp", "webp"),
        (".gif", "gif"),
        (".ico", "ico"),
    ]
    .into_iter()
    .find(|(suffix, _)| path.ends_with(suffix))
    .map(|(_, ext)| ext)
    .unwrap_or("png")
}

/// Whether a response can be stored as a logo. A missing content type is
/// accepted, HTML error pages are not.
pub fn is_image_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            let ct = ct.to_lowercase();
            ct.starts_with("image/") || ct.contains("svg")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn og_image_when_nothing_better() {
        let html = r#"<html><head>
            <meta property="og:image" content="https://ex.com/logo.png">
            </head><body><img src="/hero.jpg" alt="Ofisimiz"></body></html>"#;
        assert_eq!(
            find_logo_url(html, "https://ex.com").as_deref(),
            Some("https://ex.com/logo.png")
        );
    }

    #[test]
    fn svg_logo_has_priority() {
        let html = std::fs::read_to_string("tests/fixtures/company_home.html").unwrap();
        assert_eq!(
            find_logo_url(&html, "https://acme.com.tr/tr/").as_deref(),
            Some("https://acme.com.tr/assets/img/acme-logo.svg")
        );
    }

    #[test]
    fn data_uri_is_skipped_for_lazy_source() {
        let html = r#"<div class="logo"><img src="data:image/gif;base64,R0lGOD" data-src="/img/brand.png"></div>"#;
        assert_eq!(
            find_logo_url(html, "https://ex.com/").as_deref(),
            Some("https://ex.com/img/brand.png")
        );
    }

    #[test]
    fn icons_then_favicon() {
        let html = r#"<link rel="shortcut icon" href="/fav.png">"#;
        assert_eq!(
            find_logo_url(html, "https://ex.com/tr/").as_deref(),
            Some("https://ex.com/fav.png")
        );
        assert_eq!(
            find_logo_url("<p>bos</p>", "ex.com").as_deref(),
            Some("https://ex.com/favicon.ico")
        );
    }

    #[test]
    fn extension_detection() {
        assert_eq!(logo_extension(Some("image/svg+xml; charset=utf-8"), "x"), "svg");
        assert_eq!(logo_extension(Some("image/jpeg"), "https://ex.com/a.png"), "jpg");
        assert_eq!(logo_extension(None, "https://ex.com/logo.webp?v=2"), "webp");
        assert_eq!(logo_extension(Some("application/octet-stream"), "https://ex.com/logo"), "png");
    }

    #[test]
    fn html_is_not_an_image() {
        assert!(is_image_content_type(Some("image/png")));
        assert!(is_image_content_type(Some("image/svg+xml")));
        assert!(!is_image_content_type(Some("text/html; charset=utf-8")));
    }
}
