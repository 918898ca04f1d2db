//! Section identity and the in-flight draft.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One named unit of the final document.
///
/// Created once when the section list is loaded and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    /// Stable identifier, e.g. `"01-introduction"`
    pub id: String,

    /// Display title
    pub title: String,

    /// What the section must cover
    #[serde(default)]
    pub description: String,

    /// Position within the week (1-based), assigned at load time
    #[serde(default)]
    pub ordinal: usize,

    #[serde(default)]
    pub constraints: SectionConstraints,
}

impl SectionSpec {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            ordinal: 0,
            constraints: SectionConstraints::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub fn with_constraints(mut self, constraints: SectionConstraints) -> Self {
        self.constraints = constraints;
        self
    }
}

/// Free-form structural constraints for a section.
///
/// The well-known keys are typed; anything else in the section file is kept in
/// `extra` and passed through to the reviewer prompts untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionConstraints {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_subsections: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_style: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_words: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_estimate_minutes: Option<u32>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The current candidate text for one section.
///
/// Replaced wholesale on every revision; the derived fields (`links`,
/// `citations`, `word_count`, `objective_mapping`) always describe
/// `content_md` as it currently stands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionDraft {
    pub section_id: String,
    pub content_md: String,

    /// Outbound URLs, deduplicated in order of appearance
    #[serde(default)]
    pub links: Vec<String>,

    #[serde(default)]
    pub citations: Vec<String>,

    #[serde(default)]
    pub word_count: usize,

    /// Learning objective id → lines of the draft that reference it
    #[serde(default)]
    pub objective_mapping: BTreeMap<String, Vec<String>>,

    #[serde(default = "default_needs_revision")]
    pub needs_revision: bool,
}

fn default_needs_revision() -> bool {
    true
}

impl SectionDraft {
    /// A draft with no derived fields filled in.
    pub fn raw(section_id: impl Into<String>, content_md: impl Into<String>) -> Self {
        Self {
            section_id: section_id.into(),
            content_md: content_md.into(),
            needs_revision: true,
            ..Self::default()
        }
    }

    /// Stand-in used when the writer could not produce anything.
    pub fn placeholder(spec: &SectionSpec, reason: &str) -> Self {
        let content = format!(
            "## {}\n\n*Content unavailable: {}. This section will be regenerated on the next revision.*\n",
            spec.title, reason
        );
        Self::raw(spec.id.clone(), content)
    }
}
