//! Vocabulary shared by reviewers and the feedback prioritizer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which review role produced a piece of feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reviewer {
    Compliance,
    Learner,
    /// Whole-document reviewer run by the week compiler
    Coherence,
}

impl Reviewer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliance => "compliance",
            Self::Learner => "learner",
            Self::Coherence => "coherence",
        }
    }
}

impl fmt::Display for Reviewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority tier of a critique item. Ordering is most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl FeedbackPriority {
    pub const ALL: [FeedbackPriority; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for FeedbackPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topic of a critique item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    Template,
    ObjectiveAlignment,
    Multimedia,
    Accessibility,
    ContentQuality,
    Citations,
    Clarity,
    Technical,
}

impl FeedbackCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::ObjectiveAlignment => "objective_alignment",
            Self::Multimedia => "multimedia",
            Self::Accessibility => "accessibility",
            Self::ContentQuality => "content_quality",
            Self::Citations => "citations",
            Self::Clarity => "clarity",
            Self::Technical => "technical",
        }
    }

    /// Which reviewer wins a same-tier conflict in this category, if any.
    pub fn preferred_reviewer(&self) -> Option<Reviewer> {
        match self {
            Self::Template | Self::ObjectiveAlignment | Self::Multimedia | Self::Accessibility => {
                Some(Reviewer::Compliance)
            }
            Self::Clarity | Self::ContentQuality => Some(Reviewer::Learner),
            Self::Citations | Self::Technical => None,
        }
    }
}

impl fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized critique item, derived fresh every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrioritizedFeedback {
    pub issue: String,
    pub priority: FeedbackPriority,
    pub category: FeedbackCategory,
    pub reviewer: Reviewer,
    pub suggested_fix: String,
}

impl fmt::Display for PrioritizedFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.priority.as_str().to_uppercase(),
            self.category,
            self.reviewer,
            self.issue
        )
    }
}
