//! Lenient parsing of reviewer JSON.
//!
//! Models wrap JSON in code fences, prepend chatter, and drift on key names.
//! Anything that yields a JSON object is mapped into [`ReviewNotes`];
//! anything else is [`ReviewPayload::Unparseable`] and the caller decides
//! what that means.

use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;
use weekforge_core::feedback::Reviewer;
use weekforge_core::review::{DirectEdit, ReviewNotes, ReviewPayload};

#[derive(Debug, Deserialize)]
struct RawReview {
    #[serde(default)]
    approved: serde_json::Value,
    #[serde(default, alias = "overall_quality_score", alias = "score")]
    quality_score: serde_json::Value,
    #[serde(default, alias = "dimension_scores")]
    scores: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    required_fixes: Vec<serde_json::Value>,
    #[serde(default)]
    optional_suggestions: Vec<serde_json::Value>,
    #[serde(default)]
    direct_edits: Vec<serde_json::Value>,
}

/// The JSON object inside `raw`, ignoring fences and surrounding prose.
pub fn json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parse a reviewer response into notes tagged with `reviewer`.
pub fn parse_review(raw: &str, reviewer: Reviewer) -> ReviewPayload {
    let parsed = json_object(raw).and_then(|body| serde_json::from_str::<RawReview>(body).ok());
    let Some(review) = parsed else {
        return ReviewPayload::Unparseable {
            raw: raw.to_string(),
        };
    };

    let mut notes = ReviewNotes::new(reviewer, flag(&review.approved));
    notes.quality_score = number(&review.quality_score);
    notes.scores = review
        .scores
        .into_iter()
        .filter_map(|(name, value)| number(&value).map(|v| (name, v)))
        .collect();
    notes.required_fixes = strings(review.required_fixes);
    notes.optional_suggestions = strings(review.optional_suggestions);
    notes.direct_edits = review
        .direct_edits
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<DirectEdit>(value) {
            Ok(edit) => Some(edit),
            Err(e) => {
                debug!(%reviewer, error = %e, "Skipping malformed direct edit");
                None
            }
        })
        .collect();
    ReviewPayload::Parsed(notes)
}

/// Section id → revised Markdown from a reviser response.
///
/// Accepts either `{"sections": {...}}` or a bare id → text object.
pub fn parse_revisions(raw: &str) -> Option<BTreeMap<String, String>> {
    let value: serde_json::Value = serde_json::from_str(json_object(raw)?).ok()?;
    let object = value
        .get("sections")
        .and_then(|s| s.as_object())
        .or_else(|| value.as_object())?;

    Some(
        object
            .iter()
            .filter_map(|(id, text)| text.as_str().map(|t| (id.clone(), t.to_string())))
            .collect(),
    )
}

/// `true`, `"true"` and `"yes"` approve; anything else does not.
fn flag(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes")
        }
        _ => false,
    }
}

/// Scores arrive as numbers or as strings like `"7.5"` or `"6/10"`.
fn number(value: &serde_json::Value) -> Option<f32> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().map(|v| v as f32),
        serde_json::Value::String(s) => {
            let s = s.trim();
            let end = s
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(s.len());
            s[..end].parse().ok()
        }
        _ => None,
    }
}

/// Fixes may arrive as strings or as `{"issue": ...}` objects.
fn strings(values: Vec<serde_json::Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Object(map) => ["issue", "fix", "description", "text"]
                .iter()
                .find_map(|k| map.get(*k).and_then(|v| v.as_str()).map(String::from)),
            _ => None,
        })
        .filter(|s| !s.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use weekforge_core::review::DirectEditKind;

    #[test]
    fn fenced_json_parses() {
        let raw = "Here is my review:\n```json\n{\"approved\": false, \"quality_score\": 6.5, \"required_fixes\": [\"Add alt text to Figure 1\"], \"optional_suggestions\": []}\n```";
        let ReviewPayload::Parsed(notes) = parse_review(raw, Reviewer::Compliance) else {
            panic!("expected parsed review");
        };
        assert!(!notes.approved);
        assert_eq!(notes.reviewer, Reviewer::Compliance);
        assert_eq!(notes.quality_score, Some(6.5));
        assert_eq!(notes.required_fixes, vec!["Add alt text to Figure 1"]);
    }

    #[test]
    fn prose_is_unparseable() {
        let payload = parse_review("Looks great to me!", Reviewer::Learner);
        assert!(matches!(payload, ReviewPayload::Unparseable { .. }));

        let payload = parse_review("{not json at all}", Reviewer::Learner);
        assert!(matches!(payload, ReviewPayload::Unparseable { .. }));
    }

    #[test]
    fn aliases_and_object_fixes() {
        let raw = r#"{
            "approved": true,
            "overall_quality_score": 8,
            "dimension_scores": {"clarity": 9, "engagement": "high"},
            "required_fixes": [{"issue": "Define p-value"}, 3, ""]
        }"#;
        let ReviewPayload::Parsed(notes) = parse_review(raw, Reviewer::Learner) else {
            panic!("expected parsed review");
        };
        assert_eq!(notes.quality_score, Some(8.0));
        assert_eq!(notes.scores.len(), 1);
        assert_eq!(notes.scores["clarity"], 9.0);
        assert_eq!(notes.required_fixes, vec!["Define p-value"]);
    }

    #[test]
    fn string_scores_and_flags_keep_the_rejection() {
        let raw = r#"{"approved": "false", "quality_score": "6/10", "scores": {"clarity": "7.5"},
            "required_fixes": ["Missing required WLO mapping"]}"#;
        let notes = parse_review(raw, Reviewer::Compliance).into_notes(Reviewer::Compliance);
        assert!(!notes.approved);
        assert_eq!(notes.quality_score, Some(6.0));
        assert_eq!(notes.scores["clarity"], 7.5);
        assert_eq!(notes.required_fixes, vec!["Missing required WLO mapping"]);

        let ReviewPayload::Parsed(notes) =
            parse_review(r#"{"approved": "true", "quality_score": "n/a"}"#, Reviewer::Learner)
        else {
            panic!("expected parsed review");
        };
        assert!(notes.approved);
        assert_eq!(notes.quality_score, None);
    }

    #[test]
    fn malformed_edits_are_skipped() {
        let raw = r#"{"approved": false, "direct_edits": [
            {"type": "trim_to_word_count", "location": "Overview", "target_words": 150},
            {"type": "rewrite_everything"}
        ]}"#;
        let ReviewPayload::Parsed(notes) = parse_review(raw, Reviewer::Compliance) else {
            panic!("expected parsed review");
        };
        assert_eq!(notes.direct_edits.len(), 1);
        assert_eq!(notes.direct_edits[0].kind, DirectEditKind::TrimToWordCount);
    }

    #[test]
    fn revisions_accept_both_shapes() {
        let wrapped = r###"```json
{"sections": {"01-overview": "## Overview\nNew text"}}
```"###;
        let map = parse_revisions(wrapped).unwrap();
        assert_eq!(map["01-overview"], "## Overview\nNew text");

        let bare = r###"{"02-wlos": "## WLOs"}"###;
        assert_eq!(parse_revisions(bare).unwrap().len(), 1);
        assert!(parse_revisions("no changes needed").is_none());
    }
}
