use std::fs;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::record::{Field, Record};
use crate::store::{write_atomic, RecordStore};

/// One row of `companies.json`, the listing the site loads up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub slug: String,
    pub name: String,
    pub web: String,
    pub logo: String,
}

impl IndexEntry {
    pub fn from_record(record: &Record, logo_prefix: &str) -> IndexEntry {
        let slug = record.slug().to_string();
        let logo = record
            .text(Field::Logo)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/{}.svg", logo_prefix.trim_end_matches('/'), slug));
        IndexEntry {
            name: record.name().unwrap_or_default().to_string(),
            web: record.web().unwrap_or_default().to_string(),
            logo,
            slug,
        }
    }
}

/// Project every parsable record, sorted by slug. Broken records are
/// skipped with a warning.
pub fn build_index(store: &RecordStore, logo_prefix: &str) -> Result<Vec<IndexEntry>> {
    let entries = store.entries()?;
    let index: Vec<IndexEntry> = entries
        .par_iter()
        .filter_map(|entry| match entry.load() {
            Ok(record) => Some(IndexEntry::from_record(&record, logo_prefix)),
            Err(e) => {
                warn!(slug = %entry.slug, error = %e, "skipping record in index");
                None
            }
        })
        .collect();
    // rayon collect preserves input order, so the index stays sorted
    Ok(index)
}

pub fn write_index(path: &Path, index: &[IndexEntry]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::Write {
            path: parent.into(),
            source,
        })?;
    }
    let text = serde_json::to_string_pretty(index).map_err(|e| Error::Write {
        path: path.into(),
        source: std::io::Error::other(e),
    })?;
    write_atomic(path, text.as_bytes())
}

pub fn read_index(path: &Path) -> Result<Vec<IndexEntry>> {
    let text = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.into(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| Error::Json {
        path: path.into(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn index_sorted_with_default_logo() {
        let dir = tempfile::tempdir().unwrap();
        let store_dir = dir.path().join("company");
        fs::create_dir_all(&store_dir).unwrap();
        fs::write(
            store_dir.join("zeta.json"),
            json!({"name": "Zeta", "contact": {"web": "https://zeta.com.tr"}, "logo": "img/company/zeta.png"}).to_string(),
        )
        .unwrap();
        fs::write(store_dir.join("alfa.json"), json!({"name": "Alfa Şirketi"}).to_string()).unwrap();
        fs::write(store_dir.join("bozuk.json"), "{").unwrap();

        let store = RecordStore::open(&store_dir).unwrap();
        let index = build_index(&store, "img/company").unwrap();
        assert_eq!(
            index,
            vec![
                IndexEntry {
                    slug: "alfa".into(),
                    name: "Alfa Şirketi".into(),
                    web: "".into(),
                    logo: "img/company/alfa.svg".into(),
                },
                IndexEntry {
                    slug: "zeta".into(),
                    name: "Zeta".into(),
                    web: "https://zeta.com.tr".into(),
                    logo: "img/company/zeta.png".into(),
                },
            ]
        );

        let out = dir.path().join("data/companies.json");
        write_index(&out, &index).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        assert!(text.contains("Alfa Şirketi"));
        assert_eq!(read_index(&out).unwrap(), index);
    }
}
