use async_trait::async_trait;
use tracing::warn;

use super::commit;
use crate::batch::{Job, Outcome};
use crate::error::Result;
use crate::extract::profile::extract_profile;
use crate::fetch::Fetcher;
use crate::merge::{merge, MergePolicy};
use crate::record::Platform;
use crate::store::StoreEntry;

/// Enrich name, about, tagline and the other descriptive fields from the
/// record's LinkedIn company page.
pub struct LinkedinJob {
    pub fetcher: Fetcher,
    pub policy: MergePolicy,
    pub dry_run: bool,
}

fn is_login_wall(url: &str) -> bool {
    url.contains("/authwall") || url.contains("/login") || url.contains("/uas/")
}

#[async_trait]
impl Job for LinkedinJob {
    async fn run(&self, entry: &StoreEntry) -> Result<Outcome> {
        let mut record = entry.load()?;
        let Some(url) = record.social(Platform::Linkedin).map(str::to_string) else {
            return Ok(Outcome::Skipped("no linkedin".into()));
        };

        let page = self.fetcher.fetch_page(&url).await?;
        if is_login_wall(&page.url) {
            warn!(slug = %entry.slug, landed = %page.url, "LinkedIn served a login wall");
            return Ok(Outcome::Skipped("login wall".into()));
        }

        let profile = extract_profile(&page.html, &page.url);
        if profile.is_empty() {
            return Ok(Outcome::NoData);
        }
        let merged = merge(&mut record, &profile.into_extracted(), self.policy);
        commit(entry, &record, merged, self.dry_run)
    }
}
