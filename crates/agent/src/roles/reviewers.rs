//! Compliance, learner, and coherence reviewers plus the coherence reviser.

use crate::context::ContextComponent;
use crate::roles::{LlmRole, parse, prompts};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::warn;
use weekforge_core::collaborator::{
    CoherenceReviewer, ComplianceReviewer, LearnerReviewer, ReviewRules, SectionReviser,
};
use weekforge_core::error::GenerationError;
use weekforge_core::feedback::Reviewer;
use weekforge_core::review::{DatasetReport, LinkCheckReport, ReviewNotes, ReviewPayload};
use weekforge_core::run::PriorSection;
use weekforge_core::section::{SectionDraft, SectionSpec};

/// Floor for the compiled week when the coherence prompt must be truncated.
const DOCUMENT_FLOOR: usize = 1_000;

fn draft_component(draft: &SectionDraft) -> ContextComponent {
    ContextComponent::new("draft", draft.content_md.as_str(), 1).with_heading("**Draft:**")
}

pub struct LlmComplianceReviewer {
    role: LlmRole,
}

impl LlmComplianceReviewer {
    pub fn new(role: LlmRole) -> Self {
        Self { role }
    }
}

#[async_trait]
impl ComplianceReviewer for LlmComplianceReviewer {
    async fn review(
        &self,
        draft: &SectionDraft,
        spec: &SectionSpec,
        rules: &ReviewRules,
    ) -> Result<ReviewPayload, GenerationError> {
        let components = vec![
            ContextComponent::new("task", prompts::compliance_task(spec, rules), 1),
            draft_component(draft),
        ];
        let text = self.role.complete(prompts::COMPLIANCE_SYSTEM, components).await?;
        Ok(parse::parse_review(&text, Reviewer::Compliance))
    }
}

pub struct LlmLearnerReviewer {
    role: LlmRole,
}

impl LlmLearnerReviewer {
    pub fn new(role: LlmRole) -> Self {
        Self { role }
    }
}

#[async_trait]
impl LearnerReviewer for LlmLearnerReviewer {
    async fn review(
        &self,
        draft: &SectionDraft,
        links: &LinkCheckReport,
        datasets: &DatasetReport,
    ) -> Result<ReviewPayload, GenerationError> {
        let components = vec![
            ContextComponent::new("task", prompts::learner_task(draft, links, datasets), 1),
            draft_component(draft),
        ];
        let text = self.role.complete(prompts::LEARNER_SYSTEM, components).await?;
        Ok(parse::parse_review(&text, Reviewer::Learner))
    }
}

/// Reviews the compiled week against the week's learning objectives.
pub struct LlmCoherenceReviewer {
    role: LlmRole,
    objectives: String,
}

impl LlmCoherenceReviewer {
    pub fn new(role: LlmRole, objectives: impl Into<String>) -> Self {
        Self {
            role,
            objectives: objectives.into(),
        }
    }
}

#[async_trait]
impl CoherenceReviewer for LlmCoherenceReviewer {
    async fn review(
        &self,
        document: &str,
        week_number: u32,
    ) -> Result<ReviewPayload, GenerationError> {
        let components = vec![
            ContextComponent::new("task", prompts::coherence_task(week_number, &self.objectives), 1),
            ContextComponent::new("document", document, 2)
                .with_heading("**Complete week:**")
                .with_floor(DOCUMENT_FLOOR),
        ];
        let text = self.role.complete(prompts::COHERENCE_SYSTEM, components).await?;
        Ok(parse::parse_review(&text, Reviewer::Coherence))
    }
}

pub struct LlmSectionReviser {
    role: LlmRole,
}

impl LlmSectionReviser {
    pub fn new(role: LlmRole) -> Self {
        Self { role }
    }
}

#[async_trait]
impl SectionReviser for LlmSectionReviser {
    async fn revise(
        &self,
        sections: &[PriorSection],
        notes: &ReviewNotes,
    ) -> Result<BTreeMap<String, String>, GenerationError> {
        let components = vec![
            ContextComponent::new("task", prompts::reviser_task(sections, notes), 1),
            ContextComponent::new("sections", prompts::render_sections(sections), 1),
        ];
        let text = self.role.complete(prompts::REVISER_SYSTEM, components).await?;

        let Some(mut revised) = parse::parse_revisions(&text) else {
            warn!("Reviser response could not be parsed, keeping sections unchanged");
            return Ok(BTreeMap::new());
        };
        revised.retain(|id, _| sections.iter().any(|s| &s.id == id));
        Ok(revised)
    }
}
