use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::commit;
use crate::batch::{Job, Outcome};
use crate::error::{Error, FetchError, Result};
use crate::extract::logo::{find_logo_url, is_image_content_type, logo_extension, FALLBACK_PATHS};
use crate::fetch::{Download, Fetcher};
use crate::merge::{Change, MergeOutcome};
use crate::record::Field;
use crate::store::StoreEntry;

/// Extensions recognised as an already-downloaded logo.
const KNOWN_EXTENSIONS: &[&str] = &["svg", "png", "jpg", "jpeg", "webp"];

/// Download a logo from the company website into `logo_dir` and point the
/// record's `logo` field at it.
pub struct LogoJob {
    pub fetcher: Fetcher,
    pub logo_dir: PathBuf,
    /// Path prefix stored in the record, e.g. `img/company`.
    pub logo_prefix: String,
    /// Re-download even when a logo file already exists.
    pub force: bool,
    pub dry_run: bool,
}

impl LogoJob {
    fn existing_file(&self, slug: &str) -> Option<&'static str> {
        KNOWN_EXTENSIONS
            .iter()
            .copied()
            .find(|ext| self.logo_dir.join(format!("{}.{}", slug, ext)).is_file())
    }

    fn field_value(&self, slug: &str, ext: &str) -> String {
        format!("{}/{}.{}", self.logo_prefix.trim_end_matches('/'), slug, ext)
    }

    async fn try_download(&self, url: &str) -> std::result::Result<Download, FetchError> {
        let download = self.fetcher.download(url).await?;
        if download.bytes.is_empty() || !is_image_content_type(download.content_type.as_deref()) {
            return Err(FetchError::ContentType {
                content_type: download.content_type.unwrap_or_default(),
                url: download.url,
            });
        }
        Ok(download)
    }

    /// The page candidate first, then the usual paths on the site root.
    async fn fetch_logo(&self, page_url: &str, html: &str) -> Option<Download> {
        let mut candidates: Vec<String> = find_logo_url(html, page_url).into_iter().collect();
        if let Ok(base) = url::Url::parse(page_url) {
            candidates.extend(FALLBACK_PATHS.iter().filter_map(|p| base.join(p).ok()).map(|u| u.to_string()));
        }

        for candidate in candidates {
            match self.try_download(&candidate).await {
                Ok(download) => return Some(download),
                Err(e) => debug!(url = %candidate, error = %e, "logo candidate rejected"),
            }
        }
        None
    }

    /// Whether a `logo` value names a file that is present in `logo_dir`.
    fn names_existing_file(&self, value: &str) -> bool {
        Path::new(value)
            .file_name()
            .is_some_and(|name| self.logo_dir.join(name).is_file())
    }

    /// Point `logo` at `<slug>.<ext>`. A curated value is kept only while it
    /// still names a file on disk and this run did not just save a new one.
    fn point_at(&self, entry: &StoreEntry, ext: &str, saved: bool) -> Result<Outcome> {
        let mut record = entry.load()?;
        let value = self.field_value(&entry.slug, ext);
        let replace = match record.text(Field::Logo) {
            None => true,
            Some(current) if current == value => false,
            Some(current) => saved || !self.names_existing_file(current),
        };

        let mut merged = MergeOutcome::default();
        if replace {
            let old = record.get(Field::Logo).cloned();
            let new = Value::String(value);
            if record.set(Field::Logo, new.clone()) {
                merged.changes.push(Change {
                    field: Field::Logo,
                    old,
                    new,
                });
            }
        }
        commit(entry, &record, merged, self.dry_run)
    }
}

#[async_trait]
impl Job for LogoJob {
    async fn run(&self, entry: &StoreEntry) -> Result<Outcome> {
        if !self.force {
            if let Some(ext) = self.existing_file(&entry.slug) {
                debug!(slug = %entry.slug, ext, "logo file already present");
                return self.point_at(entry, ext, false);
            }
        }

        let record = entry.load()?;
        let Some(web) = record.web().map(str::to_string) else {
            return Ok(Outcome::Skipped("no website".into()));
        };

        let page = self.fetcher.fetch_page(&web).await?;
        let Some(download) = self.fetch_logo(&page.url, &page.html).await else {
            return Ok(Outcome::NoData);
        };
        let ext = logo_extension(download.content_type.as_deref(), &download.url);
        let target = self.logo_dir.join(format!("{}.{}", entry.slug, ext));

        if self.dry_run {
            info!(slug = %entry.slug, from = %download.url, to = %target.display(), "would save logo");
        } else {
            fs::create_dir_all(&self.logo_dir)
                .and_then(|_| fs::write(&target, &download.bytes))
                .map_err(|source| Error::Write {
                    path: target.clone(),
                    source,
                })?;
            info!(slug = %entry.slug, from = %download.url, bytes = download.bytes.len(), "saved logo");
        }

        self.point_at(entry, ext, true)
    }
}
