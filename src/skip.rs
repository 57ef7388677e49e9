//! Detection of non-article search hits.
//!
//! Search APIs routinely rank supplementary material, cover art and
//! table-of-contents entries above the article they belong to. These hits
//! carry a recognisable label either as their whole title or as a prefix
//! ("Frontispiz: Real Title"), which is what the matchers below look for.

use crate::types::Candidate;
use serde::{Deserialize, Serialize};

/// Labels that mark a hit as something other than the article itself.
pub const DEFAULT_SKIP_PATTERNS: &[&str] = &[
    "Frontispiece",
    "Frontispiz",
    "SI",
    "Supplemental Information",
    "Supplementary Information",
    "Supporting Information",
    "Cover Picture",
    "Cover Image",
    "Graphical Abstract",
    "Table of Contents",
];

/// Patterns this short only match as a standalone leading token.
const SHORT_PATTERN_LEN: usize = 3;

/// Ordered, case-insensitive set of skip labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkipPatterns {
    patterns: Vec<String>,
}

impl Default for SkipPatterns {
    fn default() -> Self {
        Self::new(DEFAULT_SKIP_PATTERNS.iter().copied())
    }
}

impl SkipPatterns {
    /// Build a set from the given labels. Blank and duplicate labels are dropped.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self {
            patterns: Vec::new(),
        };
        set.extend(patterns);
        set
    }

    /// Append labels, keeping order and ignoring ones already present.
    pub fn extend<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for pattern in patterns {
            let pattern = pattern.into().trim().to_string();
            if pattern.is_empty() {
                continue;
            }
            let lower = pattern.to_lowercase();
            if !self.patterns.iter().any(|p| p.to_lowercase() == lower) {
                self.patterns.push(pattern);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether a title is one of the labels, or starts with one.
    pub fn matches_title(&self, title: &str) -> bool {
        self.iter().any(|p| title_matches_pattern(title, p))
    }

    /// Whether free-text description mentions one of the labels.
    pub fn matches_description(&self, description: &str) -> bool {
        self.iter()
            .any(|p| description_mentions_pattern(description, p))
    }

    /// Whether a candidate is a non-article hit.
    pub fn is_special(&self, candidate: &Candidate) -> bool {
        candidate.titles().iter().any(|t| self.matches_title(t))
            || candidate
                .descriptions()
                .iter()
                .any(|d| self.matches_description(d))
    }

    /// Index of the title variant to use for a candidate: the first one that
    /// is not a label, or 0 when every variant is.
    pub fn preferred_title_index<S: AsRef<str>>(&self, titles: &[S]) -> usize {
        titles
            .iter()
            .position(|t| !self.matches_title(t.as_ref()))
            .unwrap_or(0)
    }
}

/// Match a title against one label.
///
/// The title matches when it equals the label, or starts with the label
/// followed by `:` or a space. Labels of three characters or fewer ("SI")
/// must additionally end at a token boundary, so "SI: Figures" and "SI-3"
/// match but "Silicon Nanowires" does not.
pub fn title_matches_pattern(title: &str, pattern: &str) -> bool {
    let title = title.trim().to_lowercase();
    let pattern = pattern.trim().to_lowercase();
    if pattern.is_empty() {
        return false;
    }
    if title == pattern {
        return true;
    }

    let Some(rest) = title.strip_prefix(&pattern) else {
        return false;
    };
    match rest.chars().next() {
        Some(':') | Some(' ') => true,
        Some(c) if pattern.chars().count() <= SHORT_PATTERN_LEN => !c.is_alphanumeric(),
        _ => false,
    }
}

/// Match free text against one label.
///
/// Looser than [`title_matches_pattern`]: the label may appear anywhere.
/// Short labels still need word boundaries on both sides so that "SI"
/// does not fire on every description containing "simulation".
pub fn description_mentions_pattern(text: &str, pattern: &str) -> bool {
    let text = text.to_lowercase();
    let pattern = pattern.trim().to_lowercase();
    if pattern.is_empty() {
        return false;
    }
    if pattern.chars().count() > SHORT_PATTERN_LEN {
        return text.contains(&pattern);
    }

    text.match_indices(&pattern).any(|(start, m)| {
        let before = text[..start].chars().next_back();
        let after = text[start + m.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
