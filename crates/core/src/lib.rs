//! # weekforge Core
//!
//! Domain types, collaborator traits, and error definitions for the weekforge
//! content pipeline. This crate has **no framework dependencies**: it defines
//! the model that the budget manager, the feedback prioritizer, and the section
//! pipeline are written against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (text generation, reviewers, link and dataset
//! verification, persistence, tracing) is a trait here. Implementations live in
//! their respective crates, which keeps the pipeline testable with scripted
//! stand-ins and keeps the dependency graph pointing inward.

pub mod collaborator;
pub mod error;
pub mod feedback;
pub mod provider;
pub mod review;
pub mod run;
pub mod section;

// Re-export key types at crate root for ergonomics
pub use collaborator::{
    CoherenceReviewer, ComplianceReviewer, ContentWriter, DatasetVerifier, LearnerReviewer,
    LinkVerifier, NoopTracer, PersistenceStore, ReviewRules, SearchProvider, SectionReviser,
    Tracer, WriteRequest,
};
pub use error::{
    BudgetError, Error, GenerationError, PipelineError, Result, StoreError, VerificationError,
};
pub use feedback::{FeedbackCategory, FeedbackPriority, PrioritizedFeedback, Reviewer};
pub use provider::{Generation, GenerationRequest, TextGenerator, Usage};
pub use review::{
    DatasetCheck, DatasetReport, DirectEdit, DirectEditKind, LinkCheckReport, LinkCheckResult,
    ReviewNotes, ReviewPayload,
};
pub use run::{
    FeedbackMemoryEntry, PriorSection, RevisionGuidance, RunReport, RunState, ScoreRecord,
    SearchResult, SectionOutcome, SectionStatus,
};
pub use section::{SectionConstraints, SectionDraft, SectionSpec};
