//! One week, end to end: every section through the pipeline, then compilation.

use crate::compiler::{CompiledWeek, WeekCompiler};
use crate::pipeline::SectionPipeline;
use serde_json::json;
use tracing::{info, warn};
use weekforge_core::error::PipelineError;
use weekforge_core::run::{RunReport, RunState, SectionStatus};
use weekforge_core::section::SectionSpec;

/// What a finished run hands back to its caller.
#[derive(Debug, Clone)]
pub struct WeekRun {
    pub report: RunReport,
    pub week: CompiledWeek,
}

pub struct WeekRunner {
    pipeline: SectionPipeline,
    compiler: WeekCompiler,
}

impl WeekRunner {
    pub fn new(pipeline: SectionPipeline, compiler: WeekCompiler) -> Self {
        Self { pipeline, compiler }
    }

    /// Generate, review, and compile one week.
    ///
    /// Only an empty section list or an incomplete week is an error; every
    /// collaborator failure along the way is counted in the report instead.
    pub async fn run(
        &self,
        week_number: u32,
        sections: Vec<SectionSpec>,
    ) -> Result<WeekRun, PipelineError> {
        if sections.is_empty() {
            return Err(PipelineError::NoSections(week_number));
        }

        let tracer = self.pipeline.tracer();
        info!(week = week_number, sections = sections.len(), "Starting week");
        tracer.step(
            "run_start",
            &format!("Week {week_number}"),
            json!({ "sections": sections.len() }),
        );

        let mut state = RunState::new(week_number, sections);
        let outcomes = self.pipeline.run(&mut state).await;
        let week = self.compiler.compile(&state).await?;

        let force_accepted: Vec<String> = outcomes
            .iter()
            .filter(|o| o.status == SectionStatus::ForceAccepted)
            .map(|o| o.section_id.clone())
            .collect();
        let report = RunReport {
            week_number,
            force_accepted,
            fallback_count: state.fallback_count(),
            error_count: state.error_count() + u32::from(week.location.is_none()),
            document_path: week.location.clone(),
            coherence_approved: week.coherence_approved,
            coherence_passes: week.passes,
            feedback_memory_len: state.feedback_memory().len(),
            outcomes,
        };

        if report.fully_approved() {
            info!(week = week_number, "Week fully approved");
        } else {
            warn!(
                week = week_number,
                force_accepted = ?report.force_accepted,
                coherence_approved = report.coherence_approved,
                "Week finished with unresolved feedback"
            );
        }
        tracer.step(
            "run_complete",
            &format!("Week {week_number}"),
            json!({
                "force_accepted": report.force_accepted,
                "fallbacks": report.fallback_count,
                "errors": report.error_count,
                "document": report.document_path,
            }),
        );

        Ok(WeekRun { report, week })
    }
}
