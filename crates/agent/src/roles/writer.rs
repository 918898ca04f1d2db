//! The section writer.

use crate::context::sources::{
    extract_key_guidelines, extract_relevant_syllabus, extract_template_essentials,
};
use crate::context::{ContextBudgetManager, PromptSources, standard_components, week_block};
use crate::roles::{LlmRole, prompts};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use weekforge_config::FreshnessConfig;
use weekforge_core::collaborator::{ContentWriter, ReviewRules, SearchProvider, WriteRequest};
use weekforge_core::error::GenerationError;
use weekforge_core::run::SearchResult;
use weekforge_core::section::SectionSpec;

/// Course material every writer call draws from.
#[derive(Debug, Clone, Default)]
pub struct CourseInputs {
    pub syllabus: String,
    pub template: String,
    pub guidelines: String,
}

impl CourseInputs {
    /// The syllabus block for one week, or the whole syllabus when it has no week headings.
    pub fn syllabus_for(&self, week_number: u32) -> String {
        week_block(&self.syllabus, week_number).unwrap_or_else(|| self.syllabus.clone())
    }

    /// Template structure and key guideline sections for the compliance reviewer.
    pub fn review_rules(&self, budget: &ContextBudgetManager) -> ReviewRules {
        ReviewRules {
            template_rules: extract_template_essentials(budget, &self.template),
            multimedia_rules: extract_key_guidelines(budget, &self.guidelines),
        }
    }

    /// Learning objectives the coherence reviewer checks the week against.
    pub fn objectives(&self, budget: &ContextBudgetManager, week_number: u32) -> String {
        extract_relevant_syllabus(budget, &self.syllabus_for(week_number))
    }
}

pub struct LlmWriter {
    role: LlmRole,
    inputs: Arc<CourseInputs>,
    search: Option<Arc<dyn SearchProvider>>,
    freshness: FreshnessConfig,
    total_sections: Option<usize>,
}

impl LlmWriter {
    pub fn new(role: LlmRole, inputs: Arc<CourseInputs>) -> Self {
        Self {
            role,
            inputs,
            search: None,
            freshness: FreshnessConfig::default(),
            total_sections: None,
        }
    }

    /// Search for recent sources when a section asks for current material.
    pub fn with_search(mut self, search: Arc<dyn SearchProvider>, freshness: FreshnessConfig) -> Self {
        self.search = Some(search);
        self.freshness = freshness;
        self
    }

    pub fn with_total_sections(mut self, total: usize) -> Self {
        self.total_sections = Some(total);
        self
    }

    async fn fresh_sources(&self, section: &SectionSpec) -> Vec<SearchResult> {
        let Some(search) = &self.search else {
            return Vec::new();
        };
        if !self.freshness.wants_search(&section.description) {
            return Vec::new();
        }

        let query = format!("{} latest", section.title);
        match search.search(&query, self.freshness.top_k).await {
            Ok(results) => {
                debug!(section = %section.id, %query, results = results.len(), "Freshness search");
                results
            }
            Err(e) => {
                warn!(section = %section.id, error = %e, "Freshness search failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl ContentWriter for LlmWriter {
    async fn write(&self, request: &WriteRequest) -> Result<String, GenerationError> {
        let task = prompts::writer_task(request, self.total_sections);
        let web_results = self.fresh_sources(&request.section).await;
        let syllabus = self.inputs.syllabus_for(request.week_number);

        let sources = PromptSources {
            task: &task,
            prior_sections: &request.prior_sections,
            web_results: &web_results,
            guidelines: &self.inputs.guidelines,
            syllabus: &syllabus,
            template: &self.inputs.template,
        };
        let components = standard_components(self.role.budget(), &sources);
        self.role.complete(prompts::WRITER_SYSTEM, components).await
    }
}
