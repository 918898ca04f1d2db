//! The accept / revise / force-accept decision at the end of a review cycle.

use serde::Serialize;
use weekforge_config::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Both reviewers approved and enough cycles have run
    Accept,
    /// Revision limit reached without an acceptable draft
    ForceAccept,
    Revise,
}

/// Acceptance thresholds for one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    /// Completed write/review cycles required before a dual approval counts
    pub min_iterations: u32,
    pub max_revisions: u32,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            min_iterations: 3,
            max_revisions: 5,
        }
    }
}

impl Gate {
    pub fn new(min_iterations: u32, max_revisions: u32) -> Self {
        Self {
            min_iterations,
            max_revisions,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.min_iterations, config.max_revisions)
    }

    /// Decide after the cycle numbered `revision_count` (0-based).
    pub fn decide(
        &self,
        revision_count: u32,
        compliance_approved: bool,
        learner_approved: bool,
    ) -> GateDecision {
        let cycles = revision_count + 1;
        if compliance_approved && learner_approved && cycles >= self.min_iterations {
            GateDecision::Accept
        } else if revision_count >= self.max_revisions {
            GateDecision::ForceAccept
        } else {
            GateDecision::Revise
        }
    }
}
