//! Per-record jobs for the scraping commands. Each one is
//! load → fetch → extract → merge → write-if-changed.

mod linkedin;
mod logo;
mod social;

pub use linkedin::LinkedinJob;
pub use logo::LogoJob;
pub use social::SocialJob;

use tracing::info;

use crate::batch::Outcome;
use crate::error::Result;
use crate::merge::MergeOutcome;
use crate::record::Record;
use crate::store::{write_record, StoreEntry};

/// Persist a merged record when something changed. Dry runs report the
/// same outcome without touching the file.
fn commit(entry: &StoreEntry, record: &Record, merged: MergeOutcome, dry_run: bool) -> Result<Outcome> {
    if !merged.changed() {
        return Ok(Outcome::Unchanged);
    }
    for change in &merged.changes {
        info!(slug = %entry.slug, field = %change.field, old = ?change.old, new = %change.new, dry_run, "field set");
    }
    if !dry_run {
        write_record(&entry.path, record)?;
    }
    Ok(Outcome::Updated(merged.fields().collect()))
}
