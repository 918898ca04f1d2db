//! Reviewer verdicts, mechanical edits, and verification reports.
//!
//! Reviewer output comes from a generative call and may not parse. Parsers
//! return [`ReviewPayload`]; the decision of what an unparseable review means
//! is made by the consumer, not here.

use crate::feedback::Reviewer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One reviewer's verdict for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewNotes {
    pub reviewer: Reviewer,

    #[serde(default)]
    pub approved: bool,

    /// Overall 1-10 quality score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f32>,

    /// Named dimension → 1-10 score
    #[serde(default)]
    pub scores: BTreeMap<String, f32>,

    #[serde(default)]
    pub required_fixes: Vec<String>,

    #[serde(default)]
    pub optional_suggestions: Vec<String>,

    #[serde(default)]
    pub link_check_results: Vec<LinkCheckResult>,

    #[serde(default)]
    pub direct_edits: Vec<DirectEdit>,

    /// Set when these notes were synthesized rather than returned by the reviewer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ReviewNotes {
    pub fn new(reviewer: Reviewer, approved: bool) -> Self {
        Self {
            reviewer,
            approved,
            quality_score: None,
            scores: BTreeMap::new(),
            required_fixes: Vec::new(),
            optional_suggestions: Vec::new(),
            link_check_results: Vec::new(),
            direct_edits: Vec::new(),
            note: None,
        }
    }

    /// Neutral result for a reviewer call that failed outright.
    pub fn unavailable(reviewer: Reviewer, reason: impl Into<String>) -> Self {
        let mut notes = Self::new(reviewer, false);
        notes.note = Some(reason.into());
        notes
    }

    /// Implicit approval for a reviewer whose output could not be parsed.
    pub fn implicit_approval(reviewer: Reviewer, reason: impl Into<String>) -> Self {
        let mut notes = Self::new(reviewer, true);
        notes.note = Some(reason.into());
        notes
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.quality_score = Some(score);
        self
    }

    pub fn with_fixes<I, S>(mut self, fixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_fixes = fixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dimension(mut self, name: impl Into<String>, score: f32) -> Self {
        self.scores.insert(name.into(), score);
        self
    }

    pub fn with_edit(mut self, edit: DirectEdit) -> Self {
        self.direct_edits.push(edit);
        self
    }

    /// Whether these notes came from a synthesized fallback.
    pub fn is_fallback(&self) -> bool {
        self.note.is_some()
    }
}

/// Result of parsing a reviewer's structured response.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewPayload {
    Parsed(ReviewNotes),
    Unparseable { raw: String },
}

impl ReviewPayload {
    /// Resolve to notes, treating unparseable output as implicit approval.
    pub fn into_notes(self, reviewer: Reviewer) -> ReviewNotes {
        match self {
            Self::Parsed(notes) => notes,
            Self::Unparseable { raw } => ReviewNotes::implicit_approval(
                reviewer,
                format!(
                    "review response could not be parsed ({} chars); treated as approval",
                    raw.chars().count()
                ),
            ),
        }
    }
}

// ── Direct edits ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectEditKind {
    TrimToWordCount,
    CitationFix,
    HeaderFix,
    FormattingFix,
    InsertMissingSubsection,
}

/// A mechanical transformation the pipeline applies without the writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectEdit {
    #[serde(rename = "type", alias = "kind")]
    pub kind: DirectEditKind,

    /// Heading or other locator for the edit
    #[serde(default)]
    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_words: Option<usize>,

    #[serde(default)]
    pub rationale: String,
}

impl DirectEdit {
    pub fn new(kind: DirectEditKind, location: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
            old_text: None,
            new_text: None,
            target_words: None,
            rationale: String::new(),
        }
    }

    pub fn replacing(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.old_text = Some(old.into());
        self.new_text = Some(new.into());
        self
    }

    pub fn with_new_text(mut self, new: impl Into<String>) -> Self {
        self.new_text = Some(new.into());
        self
    }

    pub fn with_target_words(mut self, words: usize) -> Self {
        self.target_words = Some(words);
        self
    }
}

// ── Verification reports ──────────────────────────────────────

/// Outcome of probing one URL across all verification rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkCheckResult {
    pub url: String,

    /// True only when every round passed
    pub ok: bool,

    /// Last observed HTTP status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub rounds_passed: u32,
    pub rounds: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkCheckReport {
    pub results: Vec<LinkCheckResult>,
}

impl LinkCheckReport {
    pub fn working(&self) -> impl Iterator<Item = &LinkCheckResult> {
        self.results.iter().filter(|r| r.ok)
    }

    pub fn broken(&self) -> impl Iterator<Item = &LinkCheckResult> {
        self.results.iter().filter(|r| !r.ok)
    }

    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|r| r.ok)
    }
}

/// One dataset reference found in a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetCheck {
    pub url: String,

    /// Host family, e.g. "kaggle", "uci", "huggingface"
    pub source: String,

    /// Owner/name style identifier when the host has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    pub exists: bool,
    pub accessible: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub datasets: Vec<DatasetCheck>,
}

impl DatasetReport {
    pub fn inaccessible(&self) -> impl Iterator<Item = &DatasetCheck> {
        self.datasets.iter().filter(|d| !d.accessible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_payload_becomes_implicit_approval() {
        let payload = ReviewPayload::Unparseable {
            raw: "not json".into(),
        };
        let notes = payload.into_notes(Reviewer::Learner);
        assert!(notes.approved);
        assert!(notes.required_fixes.is_empty());
        assert!(notes.is_fallback());
    }

    #[test]
    fn unavailable_is_neutral_rejection() {
        let notes = ReviewNotes::unavailable(Reviewer::Compliance, "timeout");
        assert!(!notes.approved);
        assert!(notes.quality_score.is_none());
        assert!(notes.required_fixes.is_empty());
    }

    #[test]
    fn direct_edit_accepts_type_key() {
        let raw = r#"{"type":"trim_to_word_count","location":"Overview","target_words":120,"rationale":"too long"}"#;
        let edit: DirectEdit = serde_json::from_str(raw).unwrap();
        assert_eq!(edit.kind, DirectEditKind::TrimToWordCount);
        assert_eq!(edit.target_words, Some(120));
    }

    #[test]
    fn review_notes_tolerate_missing_fields() {
        let raw = r#"{"reviewer":"learner","approved":false,"required_fixes":["Add an example"]}"#;
        let notes: ReviewNotes = serde_json::from_str(raw).unwrap();
        assert_eq!(notes.reviewer, Reviewer::Learner);
        assert_eq!(notes.required_fixes, vec!["Add an example".to_string()]);
        assert!(notes.direct_edits.is_empty());
    }
}
