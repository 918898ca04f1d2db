//! Feedback prioritizer: two reviewers' free-text fixes in, one plan out.
//!
//! Each fix is given a priority tier and a category by keyword match. Items
//! in the same category and tier from both reviewers are merged by a fixed
//! preference: structural categories keep the compliance reviewer's items,
//! usability categories keep the learner reviewer's. The merged list then
//! drives the revision decision and the focus window for the next draft.
//!
//! Classification is keyword-based and deterministic so every revision
//! decision can be reproduced from the logged review notes.

use serde::Serialize;
use std::collections::BTreeMap;
use weekforge_core::feedback::{FeedbackCategory, FeedbackPriority, PrioritizedFeedback, Reviewer};
use weekforge_core::review::ReviewNotes;

const CRITICAL_KEYWORDS: &[&str] = &[
    "missing",
    "required",
    "mandatory",
    "must",
    "critical",
    "template violation",
    "not compliant",
    "accessibility violation",
];

const HIGH_KEYWORDS: &[&str] = &[
    "objective",
    "wlo",
    "assessment",
    "rubric",
    "multimedia",
    "citation",
    "reference",
];

const MEDIUM_KEYWORDS: &[&str] = &[
    "clarity",
    "structure",
    "organization",
    "flow",
    "example",
    "explanation",
    "formatting",
];

/// Checked in order; the first category with a matching keyword wins.
const CATEGORY_KEYWORDS: &[(FeedbackCategory, &[&str])] = &[
    (
        FeedbackCategory::Template,
        &["template", "structure", "heading", "format", "section"],
    ),
    (
        FeedbackCategory::ObjectiveAlignment,
        &["wlo", "learning objective", "objective", "alignment"],
    ),
    (
        FeedbackCategory::Multimedia,
        &["figure", "table", "video", "multimedia", "annotation"],
    ),
    (
        FeedbackCategory::Accessibility,
        &["alt text", "accessibility", "screen reader", "caption"],
    ),
    (
        FeedbackCategory::ContentQuality,
        &["quality", "depth", "explanation", "example"],
    ),
    (
        FeedbackCategory::Citations,
        &["citation", "reference", "source", "bibliography"],
    ),
    (
        FeedbackCategory::Clarity,
        &["clarity", "clear", "confusing", "unclear", "understandable"],
    ),
    (
        FeedbackCategory::Technical,
        &["technical", "accuracy", "correct", "error"],
    ),
];

// ── Plan types ────────────────────────────────────────────────────────────

/// What the prioritizer recommends for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionAction {
    /// Revision limit reached; accept regardless of outstanding issues
    ForceApprove,
    /// Nothing critical or high remains
    Approve,
    Revise,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionStrategy {
    pub action: RevisionAction,
    pub reason: String,
    /// Categories the next draft should concentrate on, empty unless revising
    pub focus_areas: Vec<FeedbackCategory>,
    pub priority_counts: BTreeMap<FeedbackPriority, usize>,
}

/// Counts and top issues, keyed by stable lowercase names for logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedbackSummary {
    pub total_issues: usize,
    pub by_priority: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_reviewer: BTreeMap<String, usize>,
    pub top_issues: Vec<String>,
}

/// The prioritizer's full output for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackPlan {
    /// Merged feedback, most urgent first
    pub feedback: Vec<PrioritizedFeedback>,
    pub strategy: RevisionStrategy,
    pub summary: FeedbackSummary,
}

impl FeedbackPlan {
    pub fn should_approve(&self) -> bool {
        !matches!(self.strategy.action, RevisionAction::Revise)
    }

    pub fn focus_areas(&self) -> &[FeedbackCategory] {
        &self.strategy.focus_areas
    }
}

// ── Prioritizer ───────────────────────────────────────────────────────────

/// Stateless; every method is a pure function of its arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedbackPrioritizer;

impl FeedbackPrioritizer {
    pub fn new() -> Self {
        Self
    }

    /// Build the plan for one cycle.
    pub fn prioritize(
        &self,
        compliance: &ReviewNotes,
        learner: &ReviewNotes,
        revision_count: u32,
        max_revisions: u32,
    ) -> FeedbackPlan {
        let collected = self.collect(compliance, learner);
        let feedback = self.merge(collected);
        let strategy = self.strategy(&feedback, revision_count, max_revisions);
        let summary = self.summarize(&feedback);
        FeedbackPlan {
            feedback,
            strategy,
            summary,
        }
    }

    /// Priority tier of one fix. First matching keyword set wins.
    pub fn classify(&self, issue: &str) -> FeedbackPriority {
        let lower = issue.to_lowercase();
        let matches = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

        if matches(CRITICAL_KEYWORDS) {
            FeedbackPriority::Critical
        } else if matches(HIGH_KEYWORDS) {
            FeedbackPriority::High
        } else if matches(MEDIUM_KEYWORDS) {
            FeedbackPriority::Medium
        } else {
            FeedbackPriority::Low
        }
    }

    pub fn categorize(&self, issue: &str) -> FeedbackCategory {
        let lower = issue.to_lowercase();
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(category, _)| *category)
            .unwrap_or(FeedbackCategory::ContentQuality)
    }

    pub fn suggest_fix(&self, category: FeedbackCategory) -> &'static str {
        match category {
            FeedbackCategory::Template => {
                "Review the template requirements and make sure every required section and heading is present."
            }
            FeedbackCategory::ObjectiveAlignment => {
                "State which learning objective(s) this section addresses and make the content support them directly."
            }
            FeedbackCategory::Multimedia => {
                "Give every figure, table, and video a caption, a source, and alt text."
            }
            FeedbackCategory::Accessibility => {
                "Add descriptive alt text to all figures and tables and keep the content screen-reader friendly."
            }
            FeedbackCategory::ContentQuality => {
                "Strengthen the content with more specific examples, clearer explanations, or deeper analysis."
            }
            FeedbackCategory::Citations => {
                "Add complete APA citations with URLs and dates, and reference every source in the text."
            }
            FeedbackCategory::Clarity => {
                "Simplify the language, break complex ideas into steps, and tighten the flow between paragraphs."
            }
            FeedbackCategory::Technical => {
                "Check technical accuracy, calculations, and factual statements."
            }
        }
    }

    /// Fixes from reviewers that did not approve, compliance first, most urgent first.
    pub fn collect(&self, compliance: &ReviewNotes, learner: &ReviewNotes) -> Vec<PrioritizedFeedback> {
        let mut items: Vec<PrioritizedFeedback> = [compliance, learner]
            .into_iter()
            .filter(|notes| !notes.approved)
            .flat_map(|notes| {
                notes.required_fixes.iter().map(move |issue| {
                    let category = self.categorize(issue);
                    PrioritizedFeedback {
                        issue: issue.clone(),
                        priority: self.classify(issue),
                        category,
                        reviewer: notes.reviewer,
                        suggested_fix: self.suggest_fix(category).to_string(),
                    }
                })
            })
            .collect();
        items.sort_by_key(|f| f.priority);
        items
    }

    /// Resolve same-category, same-tier conflicts between the two reviewers.
    pub fn merge(&self, items: Vec<PrioritizedFeedback>) -> Vec<PrioritizedFeedback> {
        let mut groups: Vec<((FeedbackCategory, FeedbackPriority), Vec<PrioritizedFeedback>)> =
            Vec::new();
        for item in items {
            let key = (item.category, item.priority);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, group)) => group.push(item),
                None => groups.push((key, vec![item])),
            }
        }

        let mut merged: Vec<PrioritizedFeedback> = groups
            .into_iter()
            .flat_map(|((category, _), group)| {
                let conflicting = group.iter().any(|f| f.reviewer == Reviewer::Compliance)
                    && group.iter().any(|f| f.reviewer == Reviewer::Learner);
                match category.preferred_reviewer() {
                    Some(preferred) if conflicting => {
                        group.into_iter().filter(|f| f.reviewer == preferred).collect()
                    }
                    _ => group,
                }
            })
            .collect();
        merged.sort_by_key(|f| f.priority);
        merged
    }

    /// Decide between force-approve, approve, and revise.
    pub fn strategy(
        &self,
        feedback: &[PrioritizedFeedback],
        revision_count: u32,
        max_revisions: u32,
    ) -> RevisionStrategy {
        let mut counts: BTreeMap<FeedbackPriority, usize> =
            FeedbackPriority::ALL.iter().map(|p| (*p, 0)).collect();
        for item in feedback {
            *counts.entry(item.priority).or_default() += 1;
        }
        let critical = counts[&FeedbackPriority::Critical];
        let high = counts[&FeedbackPriority::High];

        if revision_count >= max_revisions {
            return RevisionStrategy {
                action: RevisionAction::ForceApprove,
                reason: "maximum revisions reached".into(),
                focus_areas: Vec::new(),
                priority_counts: counts,
            };
        }

        if critical == 0 && high == 0 {
            return RevisionStrategy {
                action: RevisionAction::Approve,
                reason: "no critical or high priority issues".into(),
                focus_areas: Vec::new(),
                priority_counts: counts,
            };
        }

        RevisionStrategy {
            action: RevisionAction::Revise,
            reason: format!("{critical} critical, {high} high priority issues"),
            focus_areas: self.focus_areas(feedback, revision_count, max_revisions),
            priority_counts: counts,
        }
    }

    /// Categories to work on, narrowing as the revision budget runs out.
    pub fn focus_areas(
        &self,
        feedback: &[PrioritizedFeedback],
        revision_count: u32,
        max_revisions: u32,
    ) -> Vec<FeedbackCategory> {
        let remaining = max_revisions.saturating_sub(revision_count);
        let cutoff = match remaining {
            0 | 1 => FeedbackPriority::Critical,
            2 => FeedbackPriority::High,
            _ => FeedbackPriority::Medium,
        };

        let mut areas = Vec::new();
        for item in feedback.iter().filter(|f| f.priority <= cutoff) {
            if !areas.contains(&item.category) {
                areas.push(item.category);
            }
        }
        areas
    }

    pub fn summarize(&self, feedback: &[PrioritizedFeedback]) -> FeedbackSummary {
        let mut summary = FeedbackSummary {
            total_issues: feedback.len(),
            ..FeedbackSummary::default()
        };
        for item in feedback {
            *summary
                .by_priority
                .entry(item.priority.as_str().to_string())
                .or_default() += 1;
            *summary
                .by_category
                .entry(item.category.as_str().to_string())
                .or_default() += 1;
            *summary
                .by_reviewer
                .entry(item.reviewer.as_str().to_string())
                .or_default() += 1;
        }
        summary.top_issues = feedback.iter().take(3).map(|f| f.issue.clone()).collect();
        summary
    }
}
