//! Merge LinkedIn pages that were saved to disk by an external fetcher.
//!
//! A dump is a text file with a `URL: <page url>` line, a `=== BODY ===`
//! marker, and the raw HTML after it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::extract::profile::extract_profile;
use crate::extract::social::canonical_link;
use crate::merge::{merge, MergePolicy};
use crate::record::Platform;
use crate::store::{write_record, RecordStore, StoreEntry};

static URL_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^URL:\s*(\S+)\s*$").unwrap());
const BODY_MARKER: &str = "=== BODY ===";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDump {
    pub url: String,
    pub html: String,
}

pub fn parse_dump(text: &str) -> Result<ResponseDump> {
    let url = URL_LINE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::Parse("no URL line".into()))?;
    let (_, body) = text
        .split_once(BODY_MARKER)
        .ok_or_else(|| Error::Parse("no body marker".into()))?;
    let html = body.trim_start().to_string();
    if html.is_empty() {
        return Err(Error::Parse("empty body".into()));
    }
    Ok(ResponseDump { url, html })
}

/// Case-insensitive lookup key for a LinkedIn page, e.g. `company/acme`.
pub fn linkedin_key(url: &str) -> Option<String> {
    let canonical = canonical_link(Platform::Linkedin, url)?;
    let key = canonical.trim_start_matches("https://linkedin.com/");
    Some(key.to_lowercase())
}

/// Map of LinkedIn key to record, built once per run.
fn linkedin_map(store: &RecordStore) -> Result<HashMap<String, StoreEntry>> {
    let mut map = HashMap::new();
    for entry in store.entries()? {
        let record = match entry.load() {
            Ok(r) => r,
            Err(e) => {
                debug!(slug = %entry.slug, error = %e, "skipping unreadable record");
                continue;
            }
        };
        if let Some(key) = record.social(Platform::Linkedin).and_then(linkedin_key) {
            map.entry(key).or_insert(entry);
        }
    }
    Ok(map)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseSummary {
    pub total: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub not_found: usize,
    pub errors: usize,
}

impl ResponseSummary {
    pub fn print(&self) {
        println!("\n=== Summary ===");
        println!("Dumps:              {}", self.total);
        println!("Updated:            {}", self.updated);
        println!("Unchanged:          {}", self.unchanged);
        println!("No matching record: {}", self.not_found);
        println!("Errors:             {}", self.errors);
    }
}

fn dump_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_dir = fs::read_dir(dir).map_err(|source| Error::Read {
        path: dir.into(),
        source,
    })?;
    let mut files: Vec<PathBuf> = read_dir
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();
    Ok(files)
}

pub fn process_responses(
    dir: &Path,
    store: &RecordStore,
    policy: MergePolicy,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<ResponseSummary> {
    let files = dump_files(dir)?;
    let files = &files[..files.len().min(limit.unwrap_or(usize::MAX))];
    let by_linkedin = linkedin_map(store)?;
    let mut summary = ResponseSummary {
        total: files.len(),
        ..Default::default()
    };

    for (i, file) in files.iter().enumerate() {
        let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let dump = fs::read_to_string(file)
            .map_err(|source| Error::Read {
                path: file.clone(),
                source,
            })
            .and_then(|text| parse_dump(&text));
        let dump = match dump {
            Ok(d) => d,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "unusable dump");
                summary.errors += 1;
                continue;
            }
        };

        let Some(entry) = linkedin_key(&dump.url).and_then(|k| by_linkedin.get(&k)) else {
            println!("[{}/{}] {}: no record for {}", i + 1, files.len(), name, dump.url);
            summary.not_found += 1;
            continue;
        };

        let result = entry.load().and_then(|mut record| {
            let profile = extract_profile(&dump.html, &dump.url);
            let merged = merge(&mut record, &profile.into_extracted(), policy);
            if merged.changed() && !dry_run {
                write_record(&entry.path, &record)?;
            }
            Ok(merged)
        });
        match result {
            Ok(merged) if merged.changed() => {
                println!(
                    "[{}/{}] {} -> {}: updated {}",
                    i + 1,
                    files.len(),
                    name,
                    entry.slug,
                    merged.fields().map(|f| f.to_string()).collect::<Vec<_>>().join(", ")
                );
                summary.updated += 1;
            }
            Ok(_) => {
                println!("[{}/{}] {} -> {}: unchanged", i + 1, files.len(), name, entry.slug);
                summary.unchanged += 1;
            }
            Err(e) => {
                warn!(file = %file.display(), slug = %entry.slug, reason = e.reason(), error = %e, "merge failed");
                summary.errors += 1;
            }
        }
    }
    Ok(summary)
}
