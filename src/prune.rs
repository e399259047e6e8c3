use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::record::{Field, Platform, Record};
use crate::store::{RecordStore, StoreEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneReason {
    NoSocial,
    SocialNotObject,
    EmptyLinkedin,
}

impl fmt::Display for PruneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PruneReason::NoSocial => "no social field",
            PruneReason::SocialNotObject => "social is not an object",
            PruneReason::EmptyLinkedin => "empty linkedin",
        })
    }
}

/// Why a record qualifies for deletion, if it does.
pub fn prune_reason(record: &Record) -> Option<PruneReason> {
    match record.data().get("social") {
        None | Some(Value::Null) => Some(PruneReason::NoSocial),
        Some(v) if !v.is_object() => Some(PruneReason::SocialNotObject),
        _ if record.is_empty(Field::Social(Platform::Linkedin)) => Some(PruneReason::EmptyLinkedin),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub entry: StoreEntry,
    pub name: String,
    pub reason: PruneReason,
}

#[derive(Debug, Default)]
pub struct PrunePlan {
    pub scanned: usize,
    pub candidates: Vec<Candidate>,
    /// Records that could not be read; never deleted.
    pub errors: Vec<(String, String)>,
}

pub fn plan(store: &RecordStore) -> Result<PrunePlan> {
    let entries = store.entries()?;
    let mut plan = PrunePlan {
        scanned: entries.len(),
        ..Default::default()
    };
    for entry in entries {
        match entry.load() {
            Ok(record) => {
                if let Some(reason) = prune_reason(&record) {
                    plan.candidates.push(Candidate {
                        name: record.name().unwrap_or_default().to_string(),
                        entry,
                        reason,
                    });
                }
            }
            Err(e) => plan.errors.push((entry.slug, e.to_string())),
        }
    }
    Ok(plan)
}

pub fn backup_dir_name(now: NaiveDateTime) -> String {
    format!("backup_linkedin_empty_{}", now.format("%Y%m%d_%H%M%S"))
}

/// Delete the planned records, copying each into `backup` first when given.
/// Returns the number of files deleted.
pub fn execute(plan: &PrunePlan, backup: Option<&Path>) -> Result<usize> {
    if let Some(dir) = backup {
        fs::create_dir_all(dir).map_err(|source| Error::Write {
            path: dir.into(),
            source,
        })?;
        info!(dir = %dir.display(), "backing up records before deletion");
    }

    let mut deleted = 0;
    for candidate in &plan.candidates {
        let path = &candidate.entry.path;
        if let Some(dir) = backup {
            let copy: PathBuf = dir.join(path.file_name().unwrap_or(path.as_os_str()));
            fs::copy(path, &copy).map_err(|source| Error::Write {
                path: copy.clone(),
                source,
            })?;
        }
        match fs::remove_file(path) {
            Ok(()) => deleted += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "could not delete record"),
        }
    }
    Ok(deleted)
}
