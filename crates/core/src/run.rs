//! Run-scoped state for one week's generation, and what a run reports.
//!
//! [`RunState`] keeps its fields private so that the invariants hold by
//! construction: the approved sequence grows in lockstep with the section
//! index, the revision counter resets on every acceptance, and the feedback
//! memory and score history only ever grow.

use crate::feedback::{FeedbackCategory, PrioritizedFeedback, Reviewer};
use crate::review::ReviewNotes;
use crate::section::{SectionDraft, SectionSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One issue remembered for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackMemoryEntry {
    pub source: Reviewer,
    pub section_title: String,
    /// Verbatim issue text as the reviewer wrote it
    pub issue: String,
}

impl fmt::Display for FeedbackMemoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.source, self.section_title, self.issue)
    }
}

/// Scores observed in one write/review cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub section_id: String,
    pub revision: u32,
    pub compliance_score: Option<f32>,
    pub learner_score: Option<f32>,
    /// Mean of whichever scores are present
    pub combined: Option<f32>,
    pub compliance_approved: bool,
    pub learner_approved: bool,
}

impl ScoreRecord {
    pub fn from_reviews(
        section_id: impl Into<String>,
        revision: u32,
        compliance: &ReviewNotes,
        learner: &ReviewNotes,
    ) -> Self {
        let present: Vec<f32> = [compliance.quality_score, learner.quality_score]
            .into_iter()
            .flatten()
            .collect();
        let combined = if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f32>() / present.len() as f32)
        };

        Self {
            section_id: section_id.into(),
            revision,
            compliance_score: compliance.quality_score,
            learner_score: learner.quality_score,
            combined,
            compliance_approved: compliance.approved,
            learner_approved: learner.approved,
        }
    }
}

/// Text of a section accepted earlier in this run or loaded from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorSection {
    pub id: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

/// Everything the writer is told when asked to revise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionGuidance {
    pub revision: u32,
    pub remaining_revisions: u32,
    pub focus_areas: Vec<FeedbackCategory>,
    /// At most five, most urgent first
    pub top_issues: Vec<PrioritizedFeedback>,
    pub compliance_fixes: Vec<String>,
    pub learner_fixes: Vec<String>,
    /// Dimensions at or above the preserve threshold
    pub preserve: BTreeMap<String, f32>,
    /// Dimensions below the preserve threshold
    pub must_fix: BTreeMap<String, f32>,
    /// Most recent run-wide feedback memory entries
    pub memory: Vec<FeedbackMemoryEntry>,
    /// Set when this revision starts from an earlier, better-scoring draft
    pub rolled_back: bool,
}

// ── Outcomes ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Accepted,
    ForceAccepted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionOutcome {
    pub section_id: String,
    pub title: String,
    pub status: SectionStatus,
    /// Revision counter at the time of acceptance
    pub revisions: u32,
    /// Completed write/review cycles
    pub cycles: u32,
    pub final_score: Option<f32>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub week_number: u32,
    pub outcomes: Vec<SectionOutcome>,
    /// Ids of sections accepted by exhausting the revision budget
    pub force_accepted: Vec<String>,
    pub fallback_count: u32,
    pub error_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_path: Option<String>,
    pub coherence_approved: bool,
    pub coherence_passes: u32,
    pub feedback_memory_len: usize,
}

impl RunReport {
    pub fn fully_approved(&self) -> bool {
        self.force_accepted.is_empty() && self.coherence_approved
    }
}

// ── Run state ─────────────────────────────────────────────────

/// The mutable record for one week's generation.
#[derive(Debug, Clone)]
pub struct RunState {
    week_number: u32,
    sections: Vec<SectionSpec>,
    current_index: usize,
    current_draft: Option<SectionDraft>,
    compliance_review: Option<ReviewNotes>,
    learner_review: Option<ReviewNotes>,
    approved: Vec<SectionDraft>,
    revision_count: u32,
    feedback_memory: Vec<FeedbackMemoryEntry>,
    score_history: Vec<ScoreRecord>,
    best_draft: Option<(f32, SectionDraft)>,
    fallback_count: u32,
    error_count: u32,
}

impl RunState {
    pub fn new(week_number: u32, sections: Vec<SectionSpec>) -> Self {
        Self {
            week_number,
            sections,
            current_index: 0,
            current_draft: None,
            compliance_review: None,
            learner_review: None,
            approved: Vec::new(),
            revision_count: 0,
            feedback_memory: Vec::new(),
            score_history: Vec::new(),
            best_draft: None,
            fallback_count: 0,
            error_count: 0,
        }
    }

    pub fn week_number(&self) -> u32 {
        self.week_number
    }

    pub fn sections(&self) -> &[SectionSpec] {
        &self.sections
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_section(&self) -> Option<&SectionSpec> {
        self.sections.get(self.current_index)
    }

    pub fn is_complete(&self) -> bool {
        self.current_index >= self.sections.len()
    }

    pub fn revision_count(&self) -> u32 {
        self.revision_count
    }

    // --- Draft and reviews ---

    /// Replace the current draft. Reviews from the previous cycle are cleared.
    pub fn set_draft(&mut self, draft: SectionDraft) {
        self.current_draft = Some(draft);
        self.compliance_review = None;
        self.learner_review = None;
    }

    pub fn current_draft(&self) -> Option<&SectionDraft> {
        self.current_draft.as_ref()
    }

    pub fn current_draft_mut(&mut self) -> Option<&mut SectionDraft> {
        self.current_draft.as_mut()
    }

    pub fn set_compliance_review(&mut self, notes: ReviewNotes) {
        self.compliance_review = Some(notes);
    }

    pub fn set_learner_review(&mut self, notes: ReviewNotes) {
        self.learner_review = Some(notes);
    }

    pub fn compliance_review(&self) -> Option<&ReviewNotes> {
        self.compliance_review.as_ref()
    }

    pub fn learner_review(&self) -> Option<&ReviewNotes> {
        self.learner_review.as_ref()
    }

    /// Move to the next revision of the current section.
    pub fn begin_revision(&mut self) {
        self.revision_count += 1;
    }

    /// Accept `draft` for the current section and advance to the next one.
    pub fn accept(&mut self, mut draft: SectionDraft) {
        draft.needs_revision = false;
        self.approved.push(draft);
        self.current_index += 1;
        self.revision_count = 0;
        self.current_draft = None;
        self.compliance_review = None;
        self.learner_review = None;
        self.best_draft = None;
    }

    pub fn approved(&self) -> &[SectionDraft] {
        &self.approved
    }

    /// Approved sections paired with their specs, in order.
    pub fn approved_sections(&self) -> impl Iterator<Item = (&SectionSpec, &SectionDraft)> {
        self.sections.iter().zip(self.approved.iter())
    }

    // --- Run-wide logs ---

    pub fn remember(&mut self, entry: FeedbackMemoryEntry) {
        self.feedback_memory.push(entry);
    }

    pub fn feedback_memory(&self) -> &[FeedbackMemoryEntry] {
        &self.feedback_memory
    }

    /// The last `n` memory entries, oldest first.
    pub fn recent_memory(&self, n: usize) -> &[FeedbackMemoryEntry] {
        let start = self.feedback_memory.len().saturating_sub(n);
        &self.feedback_memory[start..]
    }

    pub fn record_score(&mut self, record: ScoreRecord) {
        self.score_history.push(record);
    }

    pub fn score_history(&self) -> &[ScoreRecord] {
        &self.score_history
    }

    /// Best combined score recorded for a section so far.
    pub fn best_score_for(&self, section_id: &str) -> Option<f32> {
        self.score_history
            .iter()
            .filter(|r| r.section_id == section_id)
            .filter_map(|r| r.combined)
            .fold(None, |best, s| match best {
                Some(b) if b >= s => Some(b),
                _ => Some(s),
            })
    }

    /// Remember `draft` as the best candidate for the current section when
    /// it beats the one held so far.
    pub fn offer_best_draft(&mut self, score: f32, draft: &SectionDraft) {
        let better = match &self.best_draft {
            Some((best, _)) => score > *best,
            None => true,
        };
        if better {
            self.best_draft = Some((score, draft.clone()));
        }
    }

    pub fn best_draft(&self) -> Option<(f32, &SectionDraft)> {
        self.best_draft.as_ref().map(|(s, d)| (*s, d))
    }

    pub fn note_fallback(&mut self) {
        self.fallback_count += 1;
    }

    pub fn note_error(&mut self) {
        self.error_count += 1;
    }

    pub fn fallback_count(&self) -> u32 {
        self.fallback_count
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(n: usize) -> Vec<SectionSpec> {
        (0..n)
            .map(|i| SectionSpec::new(format!("0{}-s", i + 1), format!("S{}", i + 1)).with_ordinal(i + 1))
            .collect()
    }

    #[test]
    fn accept_advances_and_resets() {
        let mut state = RunState::new(1, specs(2));
        state.set_draft(SectionDraft::raw("01-s", "text"));
        state.begin_revision();
        state.begin_revision();
        assert_eq!(state.revision_count(), 2);

        let draft = state.current_draft().cloned().unwrap();
        state.accept(draft);

        assert_eq!(state.current_index(), 1);
        assert_eq!(state.approved().len(), state.current_index());
        assert_eq!(state.revision_count(), 0);
        assert!(state.current_draft().is_none());
        assert!(!state.approved()[0].needs_revision);
        assert_eq!(state.current_section().unwrap().id, "02-s");
    }

    #[test]
    fn complete_after_last_section() {
        let mut state = RunState::new(1, specs(1));
        assert!(!state.is_complete());
        state.accept(SectionDraft::raw("01-s", "x"));
        assert!(state.is_complete());
        assert!(state.current_section().is_none());
    }

    #[test]
    fn set_draft_clears_reviews() {
        let mut state = RunState::new(1, specs(1));
        state.set_draft(SectionDraft::raw("01-s", "a"));
        state.set_compliance_review(ReviewNotes::new(Reviewer::Compliance, true));
        state.set_draft(SectionDraft::raw("01-s", "b"));
        assert!(state.compliance_review().is_none());
    }

    #[test]
    fn combined_score_is_mean_of_present() {
        let c = ReviewNotes::new(Reviewer::Compliance, false).with_score(6.0);
        let l = ReviewNotes::new(Reviewer::Learner, false).with_score(8.0);
        let record = ScoreRecord::from_reviews("01-s", 0, &c, &l);
        assert_eq!(record.combined, Some(7.0));

        let l = ReviewNotes::new(Reviewer::Learner, false);
        let record = ScoreRecord::from_reviews("01-s", 0, &c, &l);
        assert_eq!(record.combined, Some(6.0));
    }

    #[test]
    fn best_score_filters_by_section() {
        let mut state = RunState::new(1, specs(2));
        let c = ReviewNotes::new(Reviewer::Compliance, false).with_score(9.0);
        let l = ReviewNotes::new(Reviewer::Learner, false).with_score(9.0);
        state.record_score(ScoreRecord::from_reviews("02-s", 0, &c, &l));
        let c = ReviewNotes::new(Reviewer::Compliance, false).with_score(5.0);
        state.record_score(ScoreRecord::from_reviews("01-s", 0, &c, &l));
        assert_eq!(state.best_score_for("01-s"), Some(7.0));
        assert_eq!(state.best_score_for("03-s"), None);
    }

    #[test]
    fn recent_memory_takes_tail() {
        let mut state = RunState::new(1, specs(1));
        for i in 0..12 {
            state.remember(FeedbackMemoryEntry {
                source: Reviewer::Learner,
                section_title: "S1".into(),
                issue: format!("issue {i}"),
            });
        }
        let recent = state.recent_memory(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].issue, "issue 2");
        assert_eq!(state.feedback_memory().len(), 12);
    }

    #[test]
    fn best_draft_only_replaced_by_better_score() {
        let mut state = RunState::new(1, specs(1));
        state.offer_best_draft(7.0, &SectionDraft::raw("01-s", "good"));
        state.offer_best_draft(6.0, &SectionDraft::raw("01-s", "worse"));
        let (score, draft) = state.best_draft().unwrap();
        assert_eq!(score, 7.0);
        assert_eq!(draft.content_md, "good");
    }
}
