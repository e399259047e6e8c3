use std::fmt;

use serde_json::{Map, Value};

/// Social platforms a record may link to. Keys outside this set are passed
/// through untouched but never written by the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Linkedin,
    X,
    Instagram,
    Facebook,
    Youtube,
    Github,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Linkedin,
        Platform::X,
        Platform::Instagram,
        Platform::Facebook,
        Platform::Youtube,
        Platform::Github,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::X => "x",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Youtube => "youtube",
            Platform::Github => "github",
        }
    }

    pub fn from_key(key: &str) -> Option<Platform> {
        Platform::ALL
            .into_iter()
            .find(|p| p.key().eq_ignore_ascii_case(key.trim()))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.key())
    }
}

/// A mergeable location inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Name,
    Tagline,
    About,
    Web,
    Logo,
    CompanySize,
    Headquarters,
    Sector,
    Social(Platform),
}

impl Field {
    /// `(parent, key)` for nested fields, `(None, key)` for top-level ones.
    fn location(self) -> (Option<&'static str>, &'static str) {
        match self {
            Field::Name => (None, "name"),
            Field::Tagline => (None, "tagline"),
            Field::About => (None, "about"),
            Field::Web => (Some("contact"), "web"),
            Field::Logo => (None, "logo"),
            Field::CompanySize => (None, "companySize"),
            Field::Headquarters => (None, "headquarters"),
            Field::Sector => (None, "sector"),
            Field::Social(p) => (Some("social"), p.key()),
        }
    }

    /// Fields that `--force` may overwrite when they already hold a value.
    pub fn is_forceable(self) -> bool {
        matches!(self, Field::Name | Field::Tagline | Field::About)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location() {
            (Some(parent), key) => write!(f, "{}.{}", parent, key),
            (None, key) => f.write_str(key),
        }
    }
}

/// Absent, null, blank strings, empty lists and empty objects all mean "unknown".
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.iter().all(|v| is_empty_value(Some(v))),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

/// One company document. The slug comes from the file name and is never
/// stored in the JSON itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    slug: String,
    data: Map<String, Value>,
}

impl Record {
    pub fn new(slug: impl Into<String>, data: Map<String, Value>) -> Self {
        Record {
            slug: slug.into(),
            data,
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn get(&self, field: Field) -> Option<&Value> {
        match field.location() {
            (Some(parent), key) => self.data.get(parent)?.as_object()?.get(key),
            (None, key) => self.data.get(key),
        }
    }

    /// Trimmed, non-empty string value of a field.
    pub fn text(&self, field: Field) -> Option<&str> {
        self.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self, field: Field) -> bool {
        is_empty_value(self.get(field))
    }

    /// Write a field, creating the parent object when it is absent or null.
    /// Returns false when the parent exists but is not an object, since
    /// replacing it would drop data.
    pub fn set(&mut self, field: Field, value: Value) -> bool {
        match field.location() {
            (None, key) => {
                self.data.insert(key.to_string(), value);
                true
            }
            (Some(parent), key) => {
                let slot = self
                    .data
                    .entry(parent.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if slot.is_null() {
                    *slot = Value::Object(Map::new());
                }
                match slot.as_object_mut() {
                    Some(obj) => {
                        obj.insert(key.to_string(), value);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.text(Field::Name)
    }

    pub fn web(&self) -> Option<&str> {
        self.text(Field::Web)
    }

    pub fn social(&self, platform: Platform) -> Option<&str> {
        self.text(Field::Social(platform))
    }

    pub fn missing_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.is_empty(Field::Social(*p)))
            .collect()
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => Record::new("acme", map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn blank_and_missing_are_both_empty() {
        let r = record(json!({"social": {"linkedin": "  ", "x": null}}));
        assert!(r.is_empty(Field::Social(Platform::Linkedin)));
        assert!(r.is_empty(Field::Social(Platform::X)));
        assert!(r.is_empty(Field::Social(Platform::Github)));
        assert!(r.is_empty(Field::Name));
    }

    #[test]
    fn empty_list_is_empty() {
        let r = record(json!({"sector": [], "tags": ["a"]}));
        assert!(r.is_empty(Field::Sector));
        assert!(is_empty_value(Some(&json!([""]))));
        assert!(!is_empty_value(Some(&json!(["Yazılım"]))));
    }

    #[test]
    fn set_creates_missing_parent() {
        let mut r = record(json!({"name": "Acme"}));
        assert!(r.set(Field::Social(Platform::X), json!("https://x.com/acme")));
        assert_eq!(r.social(Platform::X), Some("https://x.com/acme"));
    }

    #[test]
    fn set_refuses_non_object_parent() {
        let mut r = record(json!({"social": "see website"}));
        assert!(!r.set(Field::Social(Platform::X), json!("https://x.com/acme")));
        assert_eq!(r.data()["social"], json!("see website"));
    }

    #[test]
    fn missing_platforms_in_fixed_order() {
        let r = record(json!({"social": {"linkedin": "https://linkedin.com/company/acme", "github": ""}}));
        let missing = r.missing_platforms();
        assert_eq!(missing.first(), Some(&Platform::X));
        assert!(missing.contains(&Platform::Github));
        assert!(!missing.contains(&Platform::Linkedin));
    }

    #[test]
    fn field_labels() {
        assert_eq!(Field::Web.to_string(), "contact.web");
        assert_eq!(Field::Social(Platform::Youtube).to_string(), "social.youtube");
        assert_eq!(Field::CompanySize.to_string(), "companySize");
        assert_eq!(Platform::from_key("LinkedIn"), Some(Platform::Linkedin));
    }
}
