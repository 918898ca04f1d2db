//! Generation-backed implementations of the pipeline's collaborators.
//!
//! Every role shares the same shape: build a system text and a list of
//! prioritized components, pack them with the [`ContextBudgetManager`],
//! and send one request through the configured [`TextGenerator`].

pub mod parse;
pub mod prompts;
pub mod reviewers;
pub mod writer;

pub use reviewers::{LlmCoherenceReviewer, LlmComplianceReviewer, LlmLearnerReviewer, LlmSectionReviser};
pub use writer::{CourseInputs, LlmWriter};

use crate::context::{ContextBudgetManager, ContextComponent};
use std::sync::Arc;
use tracing::debug;
use weekforge_config::RoleConfig;
use weekforge_core::error::GenerationError;
use weekforge_core::provider::{GenerationRequest, TextGenerator};

/// One model configured for one role.
#[derive(Clone)]
pub struct LlmRole {
    name: &'static str,
    generator: Arc<dyn TextGenerator>,
    model: String,
    settings: RoleConfig,
    budget: ContextBudgetManager,
}

impl LlmRole {
    pub fn new(
        name: &'static str,
        generator: Arc<dyn TextGenerator>,
        model: impl Into<String>,
        settings: RoleConfig,
        budget: ContextBudgetManager,
    ) -> Self {
        Self {
            name,
            generator,
            model: model.into(),
            settings,
            budget,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn budget(&self) -> &ContextBudgetManager {
        &self.budget
    }

    /// Pack, send, and return the generated text.
    pub async fn complete(
        &self,
        system: &str,
        components: Vec<ContextComponent>,
    ) -> Result<String, GenerationError> {
        let packed = self
            .budget
            .pack(system, components)
            .map_err(|e| GenerationError::Budget(e.to_string()))?;

        let report = &packed.report;
        debug!(
            role = self.name,
            tokens = report.final_total,
            limit = report.limit,
            truncated = report.truncation_applied,
            saved = report.tokens_saved,
            "Prompt packed"
        );

        let request = GenerationRequest::new(&self.model, packed.system, packed.user)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);
        let generation = self.generator.generate(request).await?;

        if generation.text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        if let Some(usage) = generation.usage {
            debug!(
                role = self.name,
                prompt = usage.prompt_tokens,
                completion = usage.completion_tokens,
                "Generation usage"
            );
        }
        Ok(generation.text)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::SequentialGenerator;
    use super::*;
    use crate::context::ModelLimits;

    fn role(generator: Arc<SequentialGenerator>, limits: ModelLimits) -> LlmRole {
        LlmRole::new(
            "writer",
            generator,
            "gpt-4o-mini",
            RoleConfig::new(0.2, 900),
            ContextBudgetManager::new(limits),
        )
    }

    #[tokio::test]
    async fn request_carries_role_settings() {
        let generator = Arc::new(SequentialGenerator::new(&["## Done"]));
        let role = role(generator.clone(), ModelLimits::for_model("gpt-4o-mini"));

        let text = role
            .complete("system", vec![ContextComponent::new("task", "do it", 1)])
            .await
            .unwrap();

        assert_eq!(text, "## Done");
        let sent = &generator.requests()[0];
        assert_eq!(sent.model, "gpt-4o-mini");
        assert_eq!(sent.max_tokens, Some(900));
        assert!((sent.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(sent.user, "do it");
    }

    #[tokio::test]
    async fn overflow_is_budget_error_without_a_call() {
        let generator = Arc::new(SequentialGenerator::new(&[]));
        let role = role(generator.clone(), ModelLimits::new(100, 0, 0));

        let err = role
            .complete("s", vec![ContextComponent::new("task", "x".repeat(1_000), 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Budget(_)));
        assert!(generator.requests().is_empty());
    }

    #[tokio::test]
    async fn blank_output_is_an_error() {
        let generator = Arc::new(SequentialGenerator::new(&["  \n"]));
        let role = role(generator, ModelLimits::for_model("gpt-4o"));
        let err = role
            .complete("s", vec![ContextComponent::new("task", "t", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse));
    }
}
