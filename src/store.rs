use std::fs;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::record::Record;

/// A directory of `<slug>.json` company records.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

/// One record file, not yet loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub slug: String,
    pub path: PathBuf,
}

impl StoreEntry {
    pub fn from_path(path: &Path) -> Option<StoreEntry> {
        let slug = path.file_stem()?.to_str()?.to_string();
        Some(StoreEntry {
            slug,
            path: path.to_path_buf(),
        })
    }

    pub fn load(&self) -> Result<Record> {
        read_record(&self.path)
    }
}

impl RecordStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(Error::StoreNotFound(dir));
        }
        Ok(RecordStore { dir })
    }

    pub fn path_for(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slug))
    }

    /// All record files, sorted by slug.
    pub fn entries(&self) -> Result<Vec<StoreEntry>> {
        let read_dir = fs::read_dir(&self.dir).map_err(|source| Error::Read {
            path: self.dir.clone(),
            source,
        })?;

        let mut entries: Vec<StoreEntry> = read_dir
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| StoreEntry::from_path(&p))
            .collect();
        entries.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(entries)
    }

    /// Sorted entries matching `filter`, capped at `limit`.
    pub fn select(&self, filter: &SlugFilter, limit: Option<usize>) -> Result<Vec<StoreEntry>> {
        let selected = self
            .entries()?
            .into_iter()
            .filter(|e| filter.matches(&e.slug))
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        Ok(selected)
    }

    pub fn load(&self, slug: &str) -> Result<Record> {
        let path = self.path_for(slug);
        if !path.is_file() {
            return Err(Error::RecordNotFound(path));
        }
        read_record(&path)
    }
}

pub fn read_record(path: &Path) -> Result<Record> {
    let entry = StoreEntry::from_path(path).ok_or_else(|| Error::RecordNotFound(path.into()))?;
    let text = fs::read_to_string(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => Error::RecordNotFound(path.into()),
        _ => Error::Read {
            path: path.into(),
            source,
        },
    })?;
    let data: Map<String, Value> = serde_json::from_str(&text).map_err(|source| Error::Json {
        path: path.into(),
        source,
    })?;
    Ok(Record::new(entry.slug, data))
}

/// Whole-file rewrite: pretty JSON goes to a sibling temp file that is then
/// renamed over the target.
pub fn write_record(path: &Path, record: &Record) -> Result<()> {
    let text = record.to_pretty_json().map_err(|e| Error::Write {
        path: path.into(),
        source: std::io::Error::other(e),
    })?;
    write_atomic(path, text.as_bytes())
}

pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)
        .and_then(|_| fs::rename(&tmp, path))
        .map_err(|source| {
            let _ = fs::remove_file(&tmp);
            Error::Write {
                path: path.into(),
                source,
            }
        })
}

/// Slug selection for batch commands.
#[derive(Debug, Clone, Default)]
pub enum SlugFilter {
    #[default]
    All,
    Substring(String),
    Pattern(Regex),
}

impl SlugFilter {
    /// `substring` is matched case-insensitively; `pattern` is a
    /// case-insensitive regex. The pattern wins when both are given.
    pub fn new(substring: Option<&str>, pattern: Option<&str>) -> std::result::Result<Self, regex::Error> {
        if let Some(p) = pattern {
            let re = RegexBuilder::new(p).case_insensitive(true).build()?;
            return Ok(SlugFilter::Pattern(re));
        }
        Ok(match substring {
            Some(s) if !s.is_empty() => SlugFilter::Substring(s.to_lowercase()),
            _ => SlugFilter::All,
        })
    }

    pub fn matches(&self, slug: &str) -> bool {
        match self {
            SlugFilter::All => true,
            SlugFilter::Substring(s) => slug.to_lowercase().contains(s),
            SlugFilter::Pattern(re) => re.is_match(slug),
        }
    }
}

/// What a command's optional positional path refers to.
#[derive(Debug)]
pub enum Target {
    Store(RecordStore),
    Single(StoreEntry),
}

/// Resolve the positional input: a store directory, a record file, or a
/// record name looked up inside the default store.
pub fn resolve_target(input: Option<&Path>, default_store: &Path) -> Result<Target> {
    let Some(path) = input else {
        return Ok(Target::Store(RecordStore::open(default_store)?));
    };

    if path.is_dir() {
        return Ok(Target::Store(RecordStore::open(path)?));
    }
    if path.is_file() {
        return StoreEntry::from_path(path)
            .map(Target::Single)
            .ok_or_else(|| Error::RecordNotFound(path.into()));
    }

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::RecordNotFound(path.into()))?;
    let file_name = if name.ends_with(".json") {
        name.to_string()
    } else {
        format!("{}.json", name)
    };
    let candidate = default_store.join(file_name);
    if candidate.is_file() {
        if let Some(entry) = StoreEntry::from_path(&candidate) {
            return Ok(Target::Single(entry));
        }
    }
    Err(Error::RecordNotFound(path.into()))
}
