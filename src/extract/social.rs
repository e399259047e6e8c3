use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::{ElementRef, Html};
use serde_json::Value;
use tracing::{debug, info};

use super::{
    first_match, json_ld_objects, meta_content, resolve_url, selector, Extracted, Source,
};
use crate::fetch::{normalize_url, Fetcher};
use crate::record::{Field, Platform};

/// Path segments that belong to share buttons, login walls, posts and
/// listings rather than to a profile.
const IGNORED_IDS: &[&str] = &[
    "share", "sharer", "sharer.php", "intent", "plugins", "dialog", "home", "login", "hashtag",
    "search", "explore", "watch", "embed", "tr", "accounts", "p", "reel", "reels", "stories",
    "tv", "pages", "groups", "events", "people", "profile.php", "photo.php", "story.php",
    "permalink.php", "i", "orgs", "sponsors", "topics", "marketplace",
];

static LINKEDIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|[/.])linkedin\.com/(company|in)/([^/\s"'?#&]+)"#).unwrap()
});
static X: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|[/.])(?:twitter|x)\.com/(?:#!/)?([^/\s"'?#&]+)"#).unwrap()
});
static INSTAGRAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|[/.])instagram\.com/([^/\s"'?#&]+)"#).unwrap()
});
// pages/<name>/<id> and profile.php?id=<id> are kept whole; the id is the page
static FACEBOOK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:^|[/.])(?:facebook|fb)\.com/(?:pages/([^/\s"'?#&]+)/(\d+)|profile\.php\?(?:[^\s"'#]*&)?id=(\d+)|([^/\s"'?#&]+))"#,
    )
    .unwrap()
});
static YOUTUBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|[/.])youtube\.com/(c/|channel/|user/|@)([^/\s"'?#&]+)"#).unwrap()
});
static GITHUB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|[/.])github\.com/([^/\s"'?#&]+)"#).unwrap()
});

fn pattern(platform: Platform) -> &'static Regex {
    match platform {
        Platform::Linkedin => &LINKEDIN,
        Platform::X => &X,
        Platform::Instagram => &INSTAGRAM,
        Platform::Facebook => &FACEBOOK,
        Platform::Youtube => &YOUTUBE,
        Platform::Github => &GITHUB,
    }
}

/// Words that mark an anchor as a platform button.
fn hints(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Linkedin => &["linkedin"],
        Platform::X => &["twitter", "x-twitter", "icon-x", "fa-x"],
        Platform::Instagram => &["instagram"],
        Platform::Facebook => &["facebook"],
        Platform::Youtube => &["youtube"],
        Platform::Github => &["github"],
    }
}

/// Canonical profile URL for the first usable match of `platform` in `text`.
pub fn canonical_link(platform: Platform, text: &str) -> Option<String> {
    pattern(platform)
        .captures_iter(text)
        .find_map(|caps| canonical_from(platform, &caps))
}

fn canonical_from(platform: Platform, caps: &Captures<'_>) -> Option<String> {
    if platform == Platform::Facebook {
        if let (Some(name), Some(id)) = (caps.get(1), caps.get(2)) {
            return Some(format!("https://facebook.com/pages/{}/{}", name.as_str(), id.as_str()));
        }
        if let Some(id) = caps.get(3) {
            return Some(format!("https://facebook.com/profile.php?id={}", id.as_str()));
        }
    }

    let (prefix, id) = match platform {
        Platform::Linkedin | Platform::Youtube => (caps.get(1)?.as_str(), caps.get(2)?.as_str()),
        Platform::Facebook => ("", caps.get(4)?.as_str()),
        _ => ("", caps.get(1)?.as_str()),
    };
    let id = id.trim_start_matches('@');
    if id.is_empty() || IGNORED_IDS.contains(&id.to_lowercase().as_str()) {
        return None;
    }
    Some(match platform {
        Platform::Linkedin => format!("https://linkedin.com/{}/{}", prefix.to_lowercase(), id),
        Platform::X => format!("https://x.com/{}", id),
        Platform::Instagram => format!("https://instagram.com/{}", id),
        Platform::Facebook => format!("https://facebook.com/{}", id),
        Platform::Youtube => format!("https://youtube.com/{}{}", prefix.to_lowercase(), id),
        Platform::Github => format!("https://github.com/{}", id),
    })
}

type SocialStrategy = (&'static str, fn(&Source<'_>, Platform) -> Option<String>);

const STRATEGIES: &[SocialStrategy] = &[
    ("hinted-anchor", hinted_anchor),
    ("meta-tag", meta_tags),
    ("json-ld-same-as", json_ld_same_as),
    ("any-anchor", any_anchor),
];

fn anchors<'a>(src: &Source<'a>) -> Vec<(ElementRef<'a>, String)> {
    let Some(sel) = selector("a[href]") else {
        return Vec::new();
    };
    src.doc
        .select(&sel)
        .filter_map(|a| {
            let href = resolve_url(src.base, a.value().attr("href")?)?;
            Some((a, href))
        })
        .collect()
}

fn hinted_anchor(src: &Source<'_>, platform: Platform) -> Option<String> {
    let words = hints(platform);
    anchors(src).into_iter().find_map(|(a, href)| {
        let hinted = a
            .descendants()
            .filter_map(ElementRef::wrap)
            .flat_map(|el| {
                ["class", "id", "aria-label", "title"]
                    .into_iter()
                    .filter_map(move |attr| el.value().attr(attr))
            })
            .any(|value| {
                let value = value.to_lowercase();
                words.iter().any(|w| value.contains(w))
            });
        if hinted {
            canonical_link(platform, &href)
        } else {
            None
        }
    })
}

fn meta_tags(src: &Source<'_>, platform: Platform) -> Option<String> {
    if platform == Platform::X {
        let handle = ["twitter:site", "twitter:creator"]
            .into_iter()
            .filter_map(|key| meta_content(src.doc, key))
            .find_map(|content| {
                canonical_link(Platform::X, &content).or_else(|| {
                    let handle = content.trim().trim_start_matches('@');
                    let valid = !handle.is_empty()
                        && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                    valid.then(|| format!("https://x.com/{}", handle))
                })
            });
        if handle.is_some() {
            return handle;
        }
    }

    let sel = selector("meta[content]")?;
    src.doc.select(&sel).find_map(|meta| {
        let key = meta
            .value()
            .attr("property")
            .or_else(|| meta.value().attr("name"))?;
        if !matches!(key, "og:see_also" | "article:publisher") {
            return None;
        }
        canonical_link(platform, meta.value().attr("content")?)
    })
}

fn json_ld_same_as(src: &Source<'_>, platform: Platform) -> Option<String> {
    json_ld_objects(src.doc).iter().find_map(|obj| match obj.get("sameAs")? {
        Value::String(s) => canonical_link(platform, s),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .find_map(|s| canonical_link(platform, s)),
        _ => None,
    })
}

fn any_anchor(src: &Source<'_>, platform: Platform) -> Option<String> {
    anchors(src)
        .into_iter()
        .find_map(|(_, href)| canonical_link(platform, &href))
}

/// On-site `/link/...` redirect anchors, keyed by the platform they hint at.
fn redirect_candidates(src: &Source<'_>) -> BTreeMap<Platform, String> {
    let mut found = BTreeMap::new();
    for (_, href) in anchors(src) {
        let lower = href.to_lowercase();
        if !lower.contains("/link/") {
            continue;
        }
        let tail = lower.rsplit("/link/").next().unwrap_or_default();
        let platform = if tail.contains("linkedin") {
            Platform::Linkedin
        } else if tail.contains("facebook") || tail.starts_with("fb") {
            Platform::Facebook
        } else if tail.contains("twitter") || tail.trim_end_matches('/') == "x" {
            Platform::X
        } else if tail.contains("instagram") {
            Platform::Instagram
        } else if tail.contains("youtube") {
            Platform::Youtube
        } else if tail.contains("github") {
            Platform::Github
        } else {
            continue;
        };
        found.entry(platform).or_insert(href);
    }
    found
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialLink {
    pub url: String,
    /// Set while the value is an unresolved on-site redirect.
    pub via_redirect: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocialLinks {
    links: BTreeMap<Platform, SocialLink>,
}

impl SocialLinks {
    pub fn get(&self, platform: Platform) -> Option<&SocialLink> {
        self.links.get(&platform)
    }

    pub fn url(&self, platform: Platform) -> Option<&str> {
        self.get(platform).map(|l| l.url.as_str())
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn into_extracted(self) -> Extracted {
        self.links
            .into_iter()
            .map(|(p, link)| (Field::Social(p), link.url))
            .collect()
    }

    /// Follow each redirect link once and settle it on where it landed.
    pub async fn resolve_redirects(&mut self, fetcher: &Fetcher) {
        let pending: Vec<(Platform, String)> = self
            .links
            .iter()
            .filter(|(_, l)| l.via_redirect)
            .map(|(p, l)| (*p, l.url.clone()))
            .collect();

        for (platform, url) in pending {
            match fetcher.resolve_redirect(&url).await {
                Ok(landing) => {
                    self.settle_redirect(platform, &landing);
                }
                Err(e) => debug!(%platform, %url, error = %e, "redirect unresolved, keeping original"),
            }
        }
    }

    /// Replace a pending redirect with the profile it landed on. Returns
    /// false, keeping the redirect URL, when `landing` is not a profile of
    /// `platform` (a login page, the home page, another site).
    pub fn settle_redirect(&mut self, platform: Platform, landing: &str) -> bool {
        let Some(link) = self.links.get_mut(&platform).filter(|l| l.via_redirect) else {
            return false;
        };
        match canonical_link(platform, landing) {
            Some(canonical) => {
                info!(%platform, from = %link.url, to = %canonical, "resolved redirect link");
                link.url = canonical;
                link.via_redirect = false;
                true
            }
            None => {
                debug!(%platform, %landing, "redirect did not land on a profile");
                false
            }
        }
    }
}

/// Find social profile links in `html`. Never fails: an unusable base URL
/// just means relative links are skipped.
pub fn extract_social_links(html: &str, base_url: &str) -> SocialLinks {
    let doc = Html::parse_document(html);
    let base = match normalize_url(base_url) {
        Ok(url) => url,
        Err(e) => {
            debug!(error = %e, "unusable base URL");
            return SocialLinks::default();
        }
    };
    let src = Source {
        doc: &doc,
        base: &base,
    };

    let mut links: BTreeMap<Platform, SocialLink> = Platform::ALL
        .into_iter()
        .filter_map(|platform| {
            let url = first_match(STRATEGIES, |f| f(&src, platform))?;
            Some((
                platform,
                SocialLink {
                    url,
                    via_redirect: false,
                },
            ))
        })
        .collect();

    for (platform, url) in redirect_candidates(&src) {
        links.entry(platform).or_insert(SocialLink {
            url,
            via_redirect: true,
        });
    }

    SocialLinks { links }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/company_home.html").unwrap()
    }

    #[test]
    fn canonicalizes_profile_urls() {
        assert_eq!(
            canonical_link(Platform::Linkedin, "https://tr.linkedin.com/company/acme-yazilim/about/").as_deref(),
            Some("https://linkedin.com/company/acme-yazilim")
        );
        assert_eq!(
            canonical_link(Platform::X, "https://twitter.com/AcmeTR?lang=tr").as_deref(),
            Some("https://x.com/AcmeTR")
        );
        assert_eq!(
            canonical_link(Platform::Youtube, "https://www.youtube.com/@acmetr/videos").as_deref(),
            Some("https://youtube.com/@acmetr")
        );
        assert_eq!(canonical_link(Platform::X, "https://fedex.com/tr"), None);
    }

    #[test]
    fn share_widgets_are_ignored() {
        assert_eq!(
            canonical_link(Platform::Facebook, "https://www.facebook.com/sharer/sharer.php?u=x"),
            None
        );
        assert_eq!(canonical_link(Platform::X, "https://twitter.com/intent/tweet?text=hi"), None);
        assert_eq!(canonical_link(Platform::X, "https://x.com/home"), None);
    }

    #[test]
    fn non_profile_paths_are_not_profiles() {
        assert_eq!(
            canonical_link(Platform::Instagram, "https://www.instagram.com/accounts/login/?next=/acme/"),
            None
        );
        assert_eq!(canonical_link(Platform::Instagram, "https://www.instagram.com/p/CxYz123/"), None);
        assert_eq!(canonical_link(Platform::Instagram, "https://www.instagram.com/reel/CxYz123/"), None);
        assert_eq!(canonical_link(Platform::Facebook, "https://www.facebook.com/groups/acmeusers"), None);
        assert_eq!(canonical_link(Platform::Facebook, "https://www.facebook.com/profile.php"), None);
    }

    #[test]
    fn facebook_page_and_profile_ids_are_kept() {
        assert_eq!(
            canonical_link(Platform::Facebook, "https://www.facebook.com/profile.php?id=100063512345678").as_deref(),
            Some("https://facebook.com/profile.php?id=100063512345678")
        );
        assert_eq!(
            canonical_link(Platform::Facebook, "https://m.facebook.com/profile.php?ref=bookmarks&id=42").as_deref(),
            Some("https://facebook.com/profile.php?id=42")
        );
        assert_eq!(
            canonical_link(Platform::Facebook, "https://www.facebook.com/pages/Acme-Yazilim/123456").as_deref(),
            Some("https://facebook.com/pages/Acme-Yazilim/123456")
        );
        assert_eq!(
            canonical_link(Platform::Facebook, "https://www.facebook.com/acmeyazilim/").as_deref(),
            Some("https://facebook.com/acmeyazilim")
        );
    }

    #[test]
    fn redirect_settles_on_landing_profile() {
        let html = r#"<a href="/link/linkedin">In</a><a href="/link/instagram">IG</a>"#;
        let mut links = extract_social_links(html, "https://acme.com.tr");
        assert!(links.get(Platform::Linkedin).unwrap().via_redirect);

        assert!(links.settle_redirect(Platform::Linkedin, "https://www.linkedin.com/company/acme-yazilim/"));
        let linkedin = links.get(Platform::Linkedin).unwrap();
        assert_eq!(linkedin.url, "https://linkedin.com/company/acme-yazilim");
        assert!(!linkedin.via_redirect);

        // an Instagram login wall is not a profile
        assert!(!links.settle_redirect(
            Platform::Instagram,
            "https://www.instagram.com/accounts/login/?next=%2Facme%2F"
        ));
        let instagram = links.get(Platform::Instagram).unwrap();
        assert_eq!(instagram.url, "https://acme.com.tr/link/instagram");
        assert!(instagram.via_redirect);

        // already settled links are left alone
        assert!(!links.settle_redirect(Platform::Linkedin, "https://www.linkedin.com/company/other"));
        assert_eq!(links.url(Platform::Linkedin), Some("https://linkedin.com/company/acme-yazilim"));
    }

    #[test]
    fn fixture_page_links() {
        let links = extract_social_links(&fixture(), "https://acme.com.tr/tr/");
        assert_eq!(
            links.url(Platform::Linkedin),
            Some("https://linkedin.com/company/acme-yazilim")
        );
        // the footer share button is skipped, the handle comes from twitter:site
        assert_eq!(links.url(Platform::X), Some("https://x.com/acmeyazilim"));
        assert_eq!(links.url(Platform::Facebook), Some("https://facebook.com/acmeyazilim"));
        assert_eq!(links.url(Platform::Youtube), Some("https://youtube.com/channel/UC123abc"));
        assert_eq!(links.url(Platform::Github), Some("https://github.com/acme-yazilim"));

        let instagram = links.get(Platform::Instagram).unwrap();
        assert!(instagram.via_redirect);
        assert_eq!(instagram.url, "https://acme.com.tr/link/instagram");
    }

    #[test]
    fn hinted_anchor_beats_generic_anchor() {
        let html = r#"
            <a href="https://github.com/some-dependency">built with</a>
            <a class="social-github" href="https://github.com/acme">GitHub</a>"#;
        let links = extract_social_links(html, "https://acme.com.tr");
        assert_eq!(links.url(Platform::Github), Some("https://github.com/acme"));
    }

    #[test]
    fn json_ld_same_as_in_graph() {
        let html = r#"<script type="application/ld+json">
            {"@context":"https://schema.org","@graph":[{"@type":"Organization",
             "sameAs":["https://www.instagram.com/acme.tr/","https://www.linkedin.com/in/founder"]}]}
            </script>"#;
        let links = extract_social_links(html, "https://acme.com.tr");
        assert_eq!(links.url(Platform::Instagram), Some("https://instagram.com/acme.tr"));
        assert_eq!(links.url(Platform::Linkedin), Some("https://linkedin.com/in/founder"));
    }

    #[test]
    fn bad_base_url_yields_nothing() {
        assert!(extract_social_links(&fixture(), "not a url at all").is_empty());
    }

    #[tokio::test]
    async fn unresolved_redirect_keeps_original() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/link/instagram"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/link/linkedin"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("location", format!("{}/company/acme/", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/company/acme/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let html = r#"<a href="/link/instagram">IG</a><a href="/link/linkedin">In</a>"#;
        let mut links = extract_social_links(html, &server.uri());
        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        links.resolve_redirects(&fetcher).await;

        let instagram = links.get(Platform::Instagram).unwrap();
        assert_eq!(instagram.url, format!("{}/link/instagram", server.uri()));
        assert!(instagram.via_redirect);

        // a mock server is not linkedin.com, so the landing page is not a
        // profile and the redirect is kept as well
        assert!(links.get(Platform::Linkedin).unwrap().via_redirect);
    }
}
