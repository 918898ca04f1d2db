//! Context management: token counting, source extraction, and budget packing.
//!
//! Every generation call goes through [`ContextBudgetManager::pack`], which
//! fits the system text and a priority-ordered list of components into the
//! model's usable window.

pub mod budget;
pub mod sources;
pub mod token;

pub use budget::{
    BudgetReport, ComponentOutcome, ContextBudgetManager, ContextComponent, ModelLimits,
    PackedContext, TRUNCATION_MARKER,
};
pub use sources::{PromptSources, standard_components, week_block};
pub use token::{CharEstimator, TokenCounter, TokenizeError, estimate_tokens};
