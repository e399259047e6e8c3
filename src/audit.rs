use std::io;

use itertools::Itertools;
use rayon::prelude::*;
use tracing::warn;

use crate::error::Result;
use crate::record::Platform;
use crate::store::RecordStore;

/// A record with at least one empty social link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingLinks {
    pub slug: String,
    pub name: String,
    pub web: String,
    pub missing: Vec<Platform>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub total: usize,
    pub unreadable: usize,
    /// Sorted by slug.
    pub incomplete: Vec<MissingLinks>,
}

pub fn audit_store(store: &RecordStore) -> Result<AuditReport> {
    let entries = store.entries()?;
    let scanned: Vec<Option<MissingLinks>> = entries
        .par_iter()
        .map(|entry| match entry.load() {
            Ok(record) => Some(MissingLinks {
                slug: entry.slug.clone(),
                name: record.name().unwrap_or(&entry.slug).to_string(),
                web: record.web().unwrap_or_default().to_string(),
                missing: record.missing_platforms(),
            }),
            Err(e) => {
                warn!(slug = %entry.slug, error = %e, "unreadable record");
                None
            }
        })
        .collect();

    let unreadable = scanned.iter().filter(|s| s.is_none()).count();
    Ok(AuditReport {
        total: entries.len() - unreadable,
        unreadable,
        incomplete: scanned
            .into_iter()
            .flatten()
            .filter(|m| !m.missing.is_empty())
            .collect(),
    })
}

impl AuditReport {
    pub fn complete(&self) -> usize {
        self.total - self.incomplete.len()
    }

    /// Missing count per platform, most-missing first.
    pub fn missing_by_platform(&self) -> Vec<(Platform, usize)> {
        let counts = self.incomplete.iter().flat_map(|m| m.missing.iter().copied()).counts();
        Platform::ALL
            .into_iter()
            .map(|p| (p, counts.get(&p).copied().unwrap_or(0)))
            .filter(|(_, n)| *n > 0)
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .collect()
    }

    /// Number of records per count of missing links, highest count first.
    pub fn distribution(&self) -> Vec<(usize, usize)> {
        self.incomplete
            .iter()
            .map(|m| m.missing.len())
            .counts()
            .into_iter()
            .sorted_by(|a, b| b.0.cmp(&a.0))
            .collect()
    }

    /// All incomplete records, most links missing first, slug order within a tie.
    pub fn worst(&self) -> impl Iterator<Item = &MissingLinks> {
        self.incomplete
            .iter()
            .sorted_by(|a, b| b.missing.len().cmp(&a.missing.len()))
    }

    pub fn missing(&self, platform: Platform) -> impl Iterator<Item = &MissingLinks> {
        self.incomplete
            .iter()
            .filter(move |m| m.missing.contains(&platform))
    }

    pub fn print(&self, top: usize) {
        println!("\n=== Social link audit ===");
        println!("Records:        {}", self.total);
        if self.unreadable > 0 {
            println!("Unreadable:     {}", self.unreadable);
        }
        println!("Missing links:  {}", self.incomplete.len());
        println!("Complete:       {}", self.complete());

        println!("\n--- Missing per platform ---");
        for (platform, count) in self.missing_by_platform() {
            let pct = if self.total == 0 {
                0.0
            } else {
                count as f64 / self.total as f64 * 100.0
            };
            println!("  {:<10} {:>5} ({:>5.1}%)", platform, count, pct);
        }

        println!("\n--- Records by number of missing links ---");
        for (missing, records) in self.distribution() {
            println!("  {} missing: {} records", missing, records);
        }

        if top > 0 && !self.incomplete.is_empty() {
            println!("\n--- Top {} records missing the most ---", top);
            for (i, m) in self.worst().take(top).enumerate() {
                println!(
                    "{:>3}. {} ({}.json) web: {} missing: {}",
                    i + 1,
                    m.name,
                    m.slug,
                    if m.web.is_empty() { "-" } else { m.web.as_str() },
                    m.missing.iter().join(", ")
                );
            }
        }
    }
}

/// One CSV row per incomplete record, most links missing first.
pub fn export_csv<W: io::Write>(report: &AuditReport, out: W) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["file", "name", "web", "missing_count", "missing"])?;
    for m in report.worst() {
        writer.write_record([
            format!("{}.json", m.slug),
            m.name.clone(),
            m.web.clone(),
            m.missing.len().to_string(),
            m.missing.iter().join(", "),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Slugs missing `platform`, one per line.
pub fn write_missing_list<W: io::Write>(report: &AuditReport, platform: Platform, mut out: W) -> io::Result<usize> {
    let mut n = 0;
    for m in report.missing(platform) {
        writeln!(out, "{}", m.slug)?;
        n += 1;
    }
    Ok(n)
}
