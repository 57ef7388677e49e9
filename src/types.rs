//! Public types for search results.
//!
//! A search hit is kept as its raw JSON in [`Candidate`] so that
//! disambiguation can look at titles and descriptions no matter how the rest
//! of the record is shaped. Only the hit that is finally chosen is converted
//! into the typed [`Work`] view, and a shape mismatch there is a per-record
//! formatting failure rather than a failure of the whole search.

use serde::{Deserialize, Serialize};

/// Parsed search endpoint response.
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    /// Total number of matches reported by the API.
    pub total_results: u64,
    /// Returned hits in rank order.
    pub items: Vec<Candidate>,
}

impl SearchResponse {
    /// Whether the search produced no usable hits.
    pub fn is_empty(&self) -> bool {
        self.total_results == 0 || self.items.is_empty()
    }
}

/// One search hit, as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Candidate {
    raw: serde_json::Value,
}

impl Candidate {
    pub fn from_value(raw: serde_json::Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    /// Title variants in the order the API lists them.
    pub fn titles(&self) -> Vec<&str> {
        strings_of(&self.raw["title"])
    }

    /// Free-text description strings, if any.
    pub fn descriptions(&self) -> Vec<&str> {
        strings_of(&self.raw["description"])
    }

    /// DOI, for log messages.
    pub fn doi(&self) -> Option<&str> {
        self.raw["DOI"].as_str()
    }

    /// Convert into the typed record used for formatting.
    pub fn to_work(&self) -> crate::error::Result<Work> {
        Ok(Work::deserialize(&self.raw)?)
    }
}

/// Accept either a single string or an array of strings; ignore anything else.
fn strings_of(value: &serde_json::Value) -> Vec<&str> {
    match value {
        serde_json::Value::String(s) => vec![s.as_str()],
        serde_json::Value::Array(items) => items.iter().filter_map(|v| v.as_str()).collect(),
        _ => Vec::new(),
    }
}

/// Typed view of a bibliographic work record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Work {
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub author: Vec<Author>,
    #[serde(default)]
    pub container_title: Vec<String>,
    #[serde(default)]
    pub short_container_title: Vec<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<OneOrMany>,
    #[serde(default)]
    pub published_print: Option<DateField>,
    #[serde(default)]
    pub published_online: Option<DateField>,
    #[serde(default)]
    pub created: Option<DateField>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(rename = "DOI", default)]
    pub doi: Option<String>,
    #[serde(rename = "ISSN", default)]
    pub issn: Vec<String>,
    #[serde(default)]
    pub publisher: Option<String>,
}

impl Work {
    /// Publication year from the first date source that has any date parts,
    /// checked in the order print, online, created.
    pub fn year(&self) -> Option<i32> {
        [&self.published_print, &self.published_online, &self.created]
            .into_iter()
            .flatten()
            .find_map(|d| d.first_parts())
            .and_then(|parts| parts.first().copied().flatten())
    }
}

/// An author in byline order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub given: Option<String>,
}

impl Author {
    /// Format as "Family, Given", or just "Family". `None` without a family name.
    pub fn ris_name(&self) -> Option<String> {
        let family = self.family.as_deref().map(str::trim).filter(|f| !f.is_empty())?;
        match self.given.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
            Some(given) => Some(format!("{}, {}", family, given)),
            None => Some(family.to_string()),
        }
    }
}

/// A date in `{"date-parts": [[year, month, day]]}` form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateField {
    #[serde(rename = "date-parts", default)]
    pub date_parts: Vec<Vec<Option<i32>>>,
}

impl DateField {
    /// The first date-parts entry, if it is non-empty.
    pub fn first_parts(&self) -> Option<&[Option<i32>]> {
        self.date_parts
            .first()
            .filter(|parts| !parts.is_empty())
            .map(Vec::as_slice)
    }
}

/// A string field that some records carry as a one-element list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// The single value, or the first element of the list.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::One(s) => Some(s.as_str()),
            Self::Many(items) => items.first().map(String::as_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidate_accessors_are_lenient() {
        let c = Candidate::from_value(json!({
            "title": ["A", 5, "B"],
            "description": "desc",
            "DOI": "10.1/x"
        }));
        assert_eq!(c.titles(), vec!["A", "B"]);
        assert_eq!(c.descriptions(), vec!["desc"]);
        assert_eq!(c.doi(), Some("10.1/x"));

        let odd = Candidate::from_value(json!({"title": {"nested": true}}));
        assert!(odd.titles().is_empty());
        assert!(odd.descriptions().is_empty());
    }

    #[test]
    fn test_work_from_crossref_shape() {
        let c = Candidate::from_value(json!({
            "title": ["Deep Learning"],
            "author": [{"family": "LeCun", "given": "Yann", "sequence": "first"}],
            "container-title": ["Nature"],
            "short-container-title": ["Nature"],
            "published-print": {"date-parts": [[2015, 5, 28]]},
            "volume": "521",
            "issue": "7553",
            "page": "436-444",
            "DOI": "10.1038/nature14539",
            "ISSN": ["0028-0836", "1476-4687"],
            "publisher": "Springer Science and Business Media LLC",
            "score": 87.2
        }));
        let work = c.to_work().unwrap();
        assert_eq!(work.title, vec!["Deep Learning"]);
        assert_eq!(work.author[0].ris_name().as_deref(), Some("LeCun, Yann"));
        assert_eq!(work.year(), Some(2015));
        assert_eq!(work.doi.as_deref(), Some("10.1038/nature14539"));
        assert_eq!(work.issn.len(), 2);
    }

    #[test]
    fn test_malformed_work_is_an_error() {
        let c = Candidate::from_value(json!({"title": ["X"], "volume": 12}));
        assert!(c.to_work().is_err());
    }

    #[test]
    fn test_year_source_priority() {
        let work: Work = serde_json::from_value(json!({
            "published-print": {"date-parts": [[]]},
            "published-online": {"date-parts": [[2019, 3]]},
            "created": {"date-parts": [[2018, 12, 1]]}
        }))
        .unwrap();
        assert_eq!(work.year(), Some(2019));

        let created_only: Work =
            serde_json::from_value(json!({"created": {"date-parts": [[2001]]}})).unwrap();
        assert_eq!(created_only.year(), Some(2001));

        let none: Work = serde_json::from_value(json!({})).unwrap();
        assert_eq!(none.year(), None);
    }

    #[test]
    fn test_null_year_stops_the_search() {
        let work: Work = serde_json::from_value(json!({
            "published-print": {"date-parts": [[null]]},
            "created": {"date-parts": [[2020]]}
        }))
        .unwrap();
        assert_eq!(work.year(), None);
    }

    #[test]
    fn test_author_name_forms() {
        let full = Author {
            family: Some("Curie".into()),
            given: Some("Marie".into()),
        };
        let family_only = Author {
            family: Some("Aristotle".into()),
            given: None,
        };
        let consortium = Author {
            family: None,
            given: Some("ATLAS".into()),
        };
        assert_eq!(full.ris_name().as_deref(), Some("Curie, Marie"));
        assert_eq!(family_only.ris_name().as_deref(), Some("Aristotle"));
        assert_eq!(consortium.ris_name(), None);
    }

    #[test]
    fn test_one_or_many() {
        let one: OneOrMany = serde_json::from_value(json!("text")).unwrap();
        let many: OneOrMany = serde_json::from_value(json!(["first", "second"])).unwrap();
        let empty: OneOrMany = serde_json::from_value(json!([])).unwrap();
        assert_eq!(one.first(), Some("text"));
        assert_eq!(many.first(), Some("first"));
        assert_eq!(empty.first(), None);
    }
}
