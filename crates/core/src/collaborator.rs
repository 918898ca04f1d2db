//! Collaborator traits consumed by the section pipeline and week compiler.
//!
//! Each trait returns an explicit `Result` at its boundary. Collaborators own
//! their retry policy; by the time an error reaches the pipeline it is final
//! and the pipeline substitutes a fallback.

use crate::error::{GenerationError, StoreError, VerificationError};
use crate::review::{DatasetReport, LinkCheckReport, ReviewNotes, ReviewPayload};
use crate::run::{PriorSection, RevisionGuidance, SearchResult};
use crate::section::{SectionDraft, SectionSpec};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Input to one writer call.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub week_number: u32,
    pub section: SectionSpec,
    pub revision: u32,
    /// Draft to revise; `None` on the first write
    pub previous_draft: Option<SectionDraft>,
    pub guidance: Option<RevisionGuidance>,
    /// Sections accepted before this one, in order
    pub prior_sections: Vec<PriorSection>,
}

impl WriteRequest {
    pub fn is_revision(&self) -> bool {
        self.previous_draft.is_some()
    }
}

/// Template and multimedia rules handed to the compliance reviewer.
#[derive(Debug, Clone, Default)]
pub struct ReviewRules {
    pub template_rules: String,
    pub multimedia_rules: String,
}

/// Produces section Markdown.
#[async_trait]
pub trait ContentWriter: Send + Sync {
    async fn write(&self, request: &WriteRequest) -> Result<String, GenerationError>;
}

#[async_trait]
pub trait ComplianceReviewer: Send + Sync {
    async fn review(
        &self,
        draft: &SectionDraft,
        spec: &SectionSpec,
        rules: &ReviewRules,
    ) -> Result<ReviewPayload, GenerationError>;
}

#[async_trait]
pub trait LearnerReviewer: Send + Sync {
    async fn review(
        &self,
        draft: &SectionDraft,
        links: &LinkCheckReport,
        datasets: &DatasetReport,
    ) -> Result<ReviewPayload, GenerationError>;
}

/// Reviews the compiled week as a whole.
#[async_trait]
pub trait CoherenceReviewer: Send + Sync {
    async fn review(&self, document: &str, week_number: u32)
    -> Result<ReviewPayload, GenerationError>;
}

/// Revises individual sections after a coherence rejection.
///
/// Returns section id → replacement text for the sections it changed.
#[async_trait]
pub trait SectionReviser: Send + Sync {
    async fn revise(
        &self,
        sections: &[PriorSection],
        notes: &ReviewNotes,
    ) -> Result<BTreeMap<String, String>, GenerationError>;
}

/// Probes outbound links. Per-URL failures are part of the report.
#[async_trait]
pub trait LinkVerifier: Send + Sync {
    async fn verify_all(&self, urls: &[String]) -> LinkCheckReport;
}

/// Finds dataset references in Markdown and checks they exist.
#[async_trait]
pub trait DatasetVerifier: Send + Sync {
    async fn verify_all(&self, markdown: &str) -> DatasetReport;
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, VerificationError>;
}

/// Where drafts and compiled weeks are kept.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Save an accepted draft; returns a locator (path or key).
    async fn save_draft(&self, week_number: u32, draft: &SectionDraft)
    -> Result<String, StoreError>;

    /// Previously saved sections for the week, ordered by id.
    async fn load_prior_sections(&self, week_number: u32)
    -> Result<Vec<PriorSection>, StoreError>;

    async fn save_week(&self, week_number: u32, document: &str) -> Result<String, StoreError>;
}

/// Fire-and-forget progress log. Implementations must not panic or block
/// for long; a failed write is theirs to swallow.
pub trait Tracer: Send + Sync {
    fn step(&self, name: &str, message: &str, context: serde_json::Value);
}

/// A tracer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn step(&self, _name: &str, _message: &str, _context: serde_json::Value) {}
}
