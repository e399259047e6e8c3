use async_trait::async_trait;
use tracing::debug;

use super::commit;
use crate::batch::{Job, Outcome};
use crate::error::Result;
use crate::extract::social::extract_social_links;
use crate::fetch::Fetcher;
use crate::merge::{merge, MergePolicy};
use crate::store::StoreEntry;

/// Fill missing `social.*` links from the company website.
pub struct SocialJob {
    pub fetcher: Fetcher,
    pub policy: MergePolicy,
    pub dry_run: bool,
}

#[async_trait]
impl Job for SocialJob {
    async fn run(&self, entry: &StoreEntry) -> Result<Outcome> {
        let mut record = entry.load()?;
        let Some(web) = record.web().map(str::to_string) else {
            return Ok(Outcome::Skipped("no website".into()));
        };
        let missing = record.missing_platforms();
        if missing.is_empty() {
            return Ok(Outcome::Skipped("all links present".into()));
        }
        debug!(slug = %entry.slug, ?missing, %web, "looking for social links");

        let page = self.fetcher.fetch_page(&web).await?;
        let mut links = extract_social_links(&page.html, &page.url);
        links.resolve_redirects(&self.fetcher).await;
        if links.is_empty() {
            return Ok(Outcome::NoData);
        }
        debug!(slug = %entry.slug, found = links.len(), "social links extracted");

        let merged = merge(&mut record, &links.into_extracted(), self.policy);
        commit(entry, &record, merged, self.dry_run)
    }
}
