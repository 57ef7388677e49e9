//! RIS record formatting.
//!
//! Only the journal-article subset of RIS is produced. Tags are emitted in a
//! fixed order: type, title, authors, full journal, abbreviated journal,
//! abstract, year, volume, issue, page, DOI, ISSN, publisher, end marker.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::skip::SkipPatterns;
use crate::types::{Candidate, Work};

/// End-of-record marker line.
pub const END_OF_RECORD: &str = "ER  - ";

/// Separator placed between records in an output file.
pub const RECORD_SEPARATOR: &str = "\n\n";

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*?>").expect("valid tag regex"));

/// RIS tags used by the formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RisTag {
    Type,
    Title,
    Author,
    JournalFull,
    JournalAbbrev,
    Abstract,
    Year,
    Volume,
    Issue,
    StartPage,
    Doi,
    Issn,
    Publisher,
}

impl RisTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type => "TY",
            Self::Title => "TI",
            Self::Author => "AU",
            Self::JournalFull => "JF",
            Self::JournalAbbrev => "JN",
            Self::Abstract => "AB",
            Self::Year => "PY",
            Self::Volume => "VL",
            Self::Issue => "IS",
            Self::StartPage => "SP",
            Self::Doi => "DO",
            Self::Issn => "SN",
            Self::Publisher => "PB",
        }
    }
}

/// A formatted record: tagged lines, closed by [`END_OF_RECORD`] on output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RisRecord {
    fields: Vec<(RisTag, String)>,
}

impl RisRecord {
    /// A journal-article record with only its type line.
    pub fn journal_article() -> Self {
        Self {
            fields: vec![(RisTag::Type, "JOUR".to_string())],
        }
    }

    pub fn push(&mut self, tag: RisTag, value: impl Into<String>) {
        self.fields.push((tag, value.into()));
    }

    fn push_opt(&mut self, tag: RisTag, value: Option<&str>) {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.push(tag, v);
        }
    }

    pub fn fields(&self) -> &[(RisTag, String)] {
        &self.fields
    }

    /// First value for a tag.
    pub fn get(&self, tag: RisTag) -> Option<&str> {
        self.fields
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_str())
    }

    /// All values for a tag, in order.
    pub fn get_all(&self, tag: RisTag) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Output lines, including the end marker.
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .fields
            .iter()
            .map(|(tag, value)| format!("{}  - {}", tag.as_str(), value))
            .collect();
        lines.push(END_OF_RECORD.to_string());
        lines
    }
}

impl fmt::Display for RisRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

/// Join records into the contents of an output file.
pub fn format_records(records: &[RisRecord]) -> String {
    records
        .iter()
        .map(RisRecord::to_string)
        .collect::<Vec<_>>()
        .join(RECORD_SEPARATOR)
}

/// Format a chosen hit, or `None` if its shape is unusable.
///
/// A malformed hit is logged and dropped so one bad record never stops a batch.
pub fn format_candidate(candidate: &Candidate, patterns: &SkipPatterns) -> Option<RisRecord> {
    match try_format_candidate(candidate, patterns) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::error!(
                doi = candidate.doi().unwrap_or("-"),
                error = %e,
                "could not format record"
            );
            None
        }
    }
}

/// Format a chosen hit, surfacing shape errors.
pub fn try_format_candidate(candidate: &Candidate, patterns: &SkipPatterns) -> Result<RisRecord> {
    let work = candidate.to_work()?;
    Ok(format_work(&work, patterns))
}

/// Format a typed work record.
pub fn format_work(work: &Work, patterns: &SkipPatterns) -> RisRecord {
    let mut record = RisRecord::journal_article();

    if !work.title.is_empty() {
        let index = patterns.preferred_title_index(&work.title);
        record.push_opt(RisTag::Title, work.title.get(index).map(String::as_str));
    }

    for name in work.author.iter().filter_map(|a| a.ris_name()) {
        record.push(RisTag::Author, name);
    }

    record.push_opt(
        RisTag::JournalFull,
        work.container_title.first().map(String::as_str),
    );
    record.push_opt(
        RisTag::JournalAbbrev,
        work.short_container_title.first().map(String::as_str),
    );

    if let Some(text) = work.abstract_text.as_ref().and_then(|a| a.first()) {
        let cleaned = clean_abstract(text);
        if !cleaned.is_empty() {
            record.push(RisTag::Abstract, cleaned);
        }
    }

    if let Some(year) = work.year() {
        record.push(RisTag::Year, year.to_string());
    }

    record.push_opt(RisTag::Volume, work.volume.as_deref());
    record.push_opt(RisTag::Issue, work.issue.as_deref());
    record.push_opt(RisTag::StartPage, work.page.as_deref());
    record.push_opt(RisTag::Doi, work.doi.as_deref());
    record.push_opt(RisTag::Issn, work.issn.first().map(String::as_str));
    record.push_opt(RisTag::Publisher, work.publisher.as_deref());

    record
}

/// Reduce an abstract to a single plain-text line.
///
/// Unescapes literal `<`/`>` sequences, strips `<tag>` markup,
/// turns newlines into spaces and trims.
pub fn clean_abstract(raw: &str) -> String {
    let unescaped = raw
        .replace("\\u003C", "<")
        .replace("\\u003c", "<")
        .replace("\\u003E", ">")
        .replace("\\u003e", ">");
    let stripped = TAG_RE.replace_all(&unescaped, "");
    stripped
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tags(record: &RisRecord) -> Vec<&'static str> {
        record.fields().iter().map(|(t, _)| t.as_str()).collect()
    }

    #[test]
    fn test_full_record_field_order() {
        let candidate = Candidate::from_value(json!({
            "publisher": "Wiley",
            "ISSN": ["1433-7851", "1521-3773"],
            "DOI": "10.1002/anie.202000001",
            "page": "100-110",
            "issue": "4",
            "volume": "59",
            "created": {"date-parts": [[2019, 11, 2]]},
            "published-print": {"date-parts": [[2020, 1, 20]]},
            "abstract": "<jats:p>Abstract text.</jats:p>",
            "short-container-title": ["Angew. Chem. Int. Ed."],
            "container-title": ["Angewandte Chemie International Edition"],
            "author": [
                {"family": "Smith", "given": "Jane"},
                {"name": "Consortium"},
                {"family": "Doe"}
            ],
            "title": ["Frontispiz: Real Title ", "Real Title"]
        }));

        let record = format_candidate(&candidate, &SkipPatterns::default()).unwrap();
        assert_eq!(
            record.to_string(),
            [
                "TY  - JOUR",
                "TI  - Real Title",
                "AU  - Smith, Jane",
                "AU  - Doe",
                "JF  - Angewandte Chemie International Edition",
                "JN  - Angew. Chem. Int. Ed.",
                "AB  - Abstract text.",
                "PY  - 2020",
                "VL  - 59",
                "IS  - 4",
                "SP  - 100-110",
                "DO  - 10.1002/anie.202000001",
                "SN  - 1433-7851",
                "PB  - Wiley",
                "ER  - ",
            ]
            .join("\n")
        );
    }

    #[test]
    fn test_minimal_record() {
        let candidate = Candidate::from_value(json!({"DOI": "10.1/x"}));
        let record = format_candidate(&candidate, &SkipPatterns::default()).unwrap();
        assert_eq!(tags(&record), vec!["TY", "DO"]);
        assert!(record.to_string().ends_with("\nER  - "));
    }

    #[test]
    fn test_title_falls_back_to_first_variant() {
        let work = Work {
            title: vec!["  Cover Image ".into(), "SI".into()],
            ..Work::default()
        };
        let record = format_work(&work, &SkipPatterns::default());
        assert_eq!(record.get(RisTag::Title), Some("Cover Image"));
    }

    #[test]
    fn test_author_order_preserved() {
        let candidate = Candidate::from_value(json!({
            "author": [
                {"family": "Zhang", "given": "Wei"},
                {"given": "Nobody"},
                {"family": "Adams", "given": ""},
                {"family": "Müller", "given": "Jörg"}
            ]
        }));
        let record = format_candidate(&candidate, &SkipPatterns::default()).unwrap();
        assert_eq!(
            record.get_all(RisTag::Author),
            vec!["Zhang, Wei", "Adams", "Müller, Jörg"]
        );
    }

    #[test]
    fn test_abstract_normalization() {
        assert_eq!(
            clean_abstract("<p>Text with \\u003Cb\\u003Ebold\\u003C/b\\u003E</p>"),
            "Text with bold"
        );
        assert_eq!(
            clean_abstract("<jats:title>Abstract</jats:title>\n<jats:p>Line one\nline two</jats:p>\n"),
            "Abstract Line one line two"
        );
        assert_eq!(clean_abstract("a < b and c > d"), "a  d");
    }

    #[test]
    fn test_abstract_as_list_takes_first() {
        let candidate = Candidate::from_value(json!({
            "abstract": ["<p>First</p>", "Second"]
        }));
        let record = format_candidate(&candidate, &SkipPatterns::default()).unwrap();
        assert_eq!(record.get(RisTag::Abstract), Some("First"));
    }

    #[test]
    fn test_blank_fields_are_skipped() {
        let candidate = Candidate::from_value(json!({
            "container-title": [],
            "short-container-title": [""],
            "abstract": "<p> </p>",
            "ISSN": [],
            "volume": "  "
        }));
        let record = format_candidate(&candidate, &SkipPatterns::default()).unwrap();
        assert_eq!(tags(&record), vec!["TY"]);
    }

    #[test]
    fn test_malformed_candidate_is_none() {
        let candidate = Candidate::from_value(json!({
            "title": ["Fine"],
            "author": "not a list"
        }));
        assert!(try_format_candidate(&candidate, &SkipPatterns::default()).is_err());
        assert!(format_candidate(&candidate, &SkipPatterns::default()).is_none());
    }

    #[test]
    fn test_format_records_joins_with_blank_line() {
        let mut a = RisRecord::journal_article();
        a.push(RisTag::Title, "A");
        let mut b = RisRecord::journal_article();
        b.push(RisTag::Title, "B");
        assert_eq!(
            format_records(&[a, b]),
            "TY  - JOUR\nTI  - A\nER  - \n\nTY  - JOUR\nTI  - B\nER  - "
        );
        assert_eq!(format_records(&[]), "");
    }
}
