use serde_json::Value;

use crate::extract::Extracted;
use crate::record::{Field, Record};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergePolicy {
    /// Let extracted values replace curated `name`, `tagline` and `about`.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub field: Field,
    pub old: Option<Value>,
    pub new: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub changes: Vec<Change>,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.changes.iter().map(|c| c.field)
    }
}

fn to_value(field: Field, text: &str) -> Value {
    match field {
        Field::Sector => Value::Array(vec![Value::String(text.to_string())]),
        _ => Value::String(text.to_string()),
    }
}

/// Apply `extracted` onto `record`. Empty fields are filled; non-empty ones
/// are only replaced under `force` for forceable fields. Nothing is removed.
pub fn merge(record: &mut Record, extracted: &Extracted, policy: MergePolicy) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for (&field, text) in extracted {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let new = to_value(field, text);
        let existing = record.get(field);

        if !record.is_empty(field) {
            let may_overwrite = policy.force && field.is_forceable();
            if !may_overwrite || existing == Some(&new) {
                continue;
            }
        }

        let old = existing.cloned();
        if record.set(field, new.clone()) {
            outcome.changes.push(Change { field, old, new });
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Platform;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => Record::new("acme", map),
            _ => unreachable!(),
        }
    }

    fn extracted(pairs: &[(Field, &str)]) -> Extracted {
        pairs.iter().map(|(f, v)| (*f, v.to_string())).collect()
    }

    #[test]
    fn curated_linkedin_survives_without_force() {
        let mut r = record(json!({"social": {"linkedin": "https://linkedin.com/company/acme"}}));
        let scraped = extracted(&[(
            Field::Social(Platform::Linkedin),
            "https://linkedin.com/company/acme-other",
        )]);

        let outcome = merge(&mut r, &scraped, MergePolicy::default());
        assert!(!outcome.changed());
        assert_eq!(r.social(Platform::Linkedin), Some("https://linkedin.com/company/acme"));

        // social links are never forceable
        let outcome = merge(&mut r, &scraped, MergePolicy { force: true });
        assert!(!outcome.changed());
    }

    #[test]
    fn empty_x_is_set_once() {
        let mut r = record(json!({"name": "Acme", "social": {"x": ""}}));
        let scraped = extracted(&[(Field::Social(Platform::X), "https://x.com/acme")]);

        let first = merge(&mut r, &scraped, MergePolicy::default());
        assert!(first.changed());
        assert_eq!(first.changes[0].old, Some(json!("")));
        assert_eq!(r.social(Platform::X), Some("https://x.com/acme"));

        let second = merge(&mut r, &scraped, MergePolicy::default());
        assert!(!second.changed());
    }

    #[test]
    fn force_replaces_only_descriptive_fields() {
        let mut r = record(json!({
            "name": "ACME",
            "about": "Eski açıklama",
            "contact": {"web": "https://acme.com.tr"}
        }));
        let scraped = extracted(&[
            (Field::Name, "Acme Yazılım"),
            (Field::About, "Eski açıklama"),
            (Field::Web, "https://acme.example"),
        ]);

        let outcome = merge(&mut r, &scraped, MergePolicy { force: true });
        assert_eq!(outcome.fields().collect::<Vec<_>>(), vec![Field::Name]);
        assert_eq!(r.name(), Some("Acme Yazılım"));
        assert_eq!(r.web(), Some("https://acme.com.tr"));
    }

    #[test]
    fn sector_fills_empty_list() {
        let mut r = record(json!({"sector": [], "BIST": {"code": "ACM"}}));
        let outcome = merge(&mut r, &extracted(&[(Field::Sector, "Yazılım")]), MergePolicy::default());
        assert!(outcome.changed());
        assert_eq!(r.data()["sector"], json!(["Yazılım"]));
        assert_eq!(r.data()["BIST"], json!({"code": "ACM"}));
    }

    #[test]
    fn blank_extraction_is_ignored() {
        let mut r = record(json!({"tagline": ""}));
        let outcome = merge(&mut r, &extracted(&[(Field::Tagline, "   ")]), MergePolicy { force: true });
        assert!(!outcome.changed());
        assert_eq!(r.data()["tagline"], json!(""));
    }
}
