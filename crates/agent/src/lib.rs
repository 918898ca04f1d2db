//! The weekforge content pipeline.
//!
//! A week is produced section by section:
//!
//! 1. **Pack** the writer prompt into the model's window ([`context`])
//! 2. **Draft** the section and collect compliance and learner reviews
//! 3. **Prioritize** the reviewers' fixes into one ranked plan ([`feedback`])
//! 4. **Gate**: accept, revise with guidance, or force-accept at the limit ([`pipeline`])
//! 5. **Compile** the approved sections and run coherence passes ([`compiler`])
//!
//! Every external call goes through a trait from `weekforge-core`, so the whole
//! loop runs against scripted stand-ins in tests.

pub mod compiler;
pub mod context;
pub mod feedback;
pub mod pipeline;
pub mod roles;
pub mod runner;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use compiler::{CompiledWeek, WeekCompiler, compile_document};
pub use context::{
    BudgetReport, ComponentOutcome, ContextBudgetManager, ContextComponent, ModelLimits,
    PackedContext, PromptSources, standard_components, week_block,
};
pub use feedback::{FeedbackPlan, FeedbackPrioritizer, RevisionAction, RevisionStrategy};
pub use pipeline::{Gate, GateDecision, PipelineSettings, SectionPipeline};
pub use roles::{
    CourseInputs, LlmCoherenceReviewer, LlmComplianceReviewer, LlmLearnerReviewer, LlmRole,
    LlmSectionReviser, LlmWriter,
};
pub use runner::{WeekRun, WeekRunner};
