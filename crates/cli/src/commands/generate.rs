//! `weekforge generate`: write, review, and compile one week.

use super::inputs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use weekforge_agent::roles::prompts;
use weekforge_agent::{
    ComponentOutcome, ContextBudgetManager, CourseInputs, LlmCoherenceReviewer,
    LlmComplianceReviewer, LlmLearnerReviewer, LlmRole, LlmSectionReviser, LlmWriter,
    PipelineSettings, PromptSources, SectionPipeline, WeekCompiler, WeekRunner,
    standard_components, week_block,
};
use weekforge_config::{AppConfig, RoleConfig};
use weekforge_core::collaborator::WriteRequest;
use weekforge_core::run::SectionStatus;
use weekforge_core::section::SectionSpec;
use weekforge_memory::FileStore;
use weekforge_providers::build_generator;
use weekforge_telemetry::JsonlTracer;
use weekforge_tools::{DatasetChecker, HttpProbe, LinkChecker, TavilySearch};

pub async fn run(
    config_path: Option<&Path>,
    week: u32,
    sections_path: Option<&Path>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = inputs::load_config(config_path)?;
    let sections = inputs::load_sections(sections_path)?;
    if sections.is_empty() {
        return Err(format!("no sections to generate for week {week}").into());
    }
    let course = Arc::new(inputs::course_inputs(&config.paths));

    if dry_run {
        print_plan(&config, &course, week, &sections)?;
        return Ok(());
    }

    println!("📚 Generating Week {week} ({} sections)", sections.len());

    let generator = build_generator(&config)?;
    let role = |name: &'static str, settings: RoleConfig| {
        LlmRole::new(
            name,
            Arc::clone(&generator),
            &config.default_model,
            settings,
            budget_for(&config),
        )
    };

    let mut writer = LlmWriter::new(role("writer", config.roles.writer), Arc::clone(&course))
        .with_total_sections(sections.len());
    let timeout = Duration::from_secs(config.verification.timeout_secs);
    if let Some(key) = &config.search_api_key {
        writer = writer.with_search(
            Arc::new(TavilySearch::new(key, timeout)),
            config.freshness.clone(),
        );
    } else {
        info!("No search key configured, sections will not use fresh web sources");
    }

    let probe = Arc::new(HttpProbe::new(timeout));
    let links = LinkChecker::new(probe.clone())
        .with_rounds(config.verification.link_rounds)
        .with_paywalled_domains(config.verification.paywalled_domains.clone());

    let store = Arc::new(FileStore::new(
        config.paths.sections_dir(),
        config.paths.weekly_dir(),
    ));
    let tracer = Arc::new(JsonlTracer::for_week(&config.paths.run_logs_dir, week));
    info!(run_id = tracer.run_id(), trace = %tracer.path().display(), "Tracing run");

    let pipeline = SectionPipeline::new(
        Arc::new(writer),
        Arc::new(LlmComplianceReviewer::new(role("compliance", config.roles.compliance))),
        Arc::new(LlmLearnerReviewer::new(role("learner", config.roles.learner))),
        store.clone(),
    )
    .with_verifiers(Arc::new(links), Arc::new(DatasetChecker::new(probe)))
    .with_rules(course.review_rules(&budget_for(&config)))
    .with_settings(PipelineSettings::from_config(&config))
    .with_tracer(tracer.clone());

    let objectives = course.objectives(&budget_for(&config), week);
    let mut compiler = WeekCompiler::new(store.clone())
        .with_coherence(Arc::new(LlmCoherenceReviewer::new(
            role("coherence", config.roles.coherence),
            objectives,
        )))
        .with_reviser(Arc::new(LlmSectionReviser::new(role(
            "reviser",
            config.roles.writer,
        ))))
        .with_passes(config.pipeline.coherence_passes)
        .with_tracer(tracer.clone());
    if let Some(title) = week_block(&course.syllabus, week).and_then(|b| inputs::week_title(&b)) {
        compiler = compiler.with_title(title);
    }

    let run = WeekRunner::new(pipeline, compiler).run(week, sections).await?;
    let report = &run.report;

    println!();
    for outcome in &report.outcomes {
        let mark = match outcome.status {
            SectionStatus::Accepted => "✅",
            SectionStatus::ForceAccepted => "⚠️ ",
        };
        let score = outcome
            .final_score
            .map_or_else(|| "n/a".to_string(), |s| format!("{s:.1}"));
        println!(
            "  {mark} {:<32} cycles {}  score {score}",
            outcome.title, outcome.cycles
        );
    }

    println!();
    match &report.document_path {
        Some(path) => println!("  💾 Saved to: {path}"),
        None => println!("  ❌ Compiled week could not be saved"),
    }
    println!(
        "  🔁 Coherence: {} after {} pass(es)",
        if report.coherence_approved { "approved" } else { "not approved" },
        report.coherence_passes
    );
    if report.fallback_count > 0 || report.error_count > 0 {
        println!(
            "  ⚠️  {} fallback(s), {} error(s) handled; see {}",
            report.fallback_count,
            report.error_count,
            tracer.path().display()
        );
    }

    println!();
    if report.fully_approved() {
        println!("  🎉 Week {week} fully approved.");
    } else {
        println!(
            "  ⚠️  Week {week} finished with {} force-accepted section(s).",
            report.force_accepted.len()
        );
    }

    let stats = tracer.stats();
    if let Some(ms) = stats.elapsed_ms() {
        println!("  ⏱  {:.1}s, {} traced steps", ms as f64 / 1000.0, stats.total_events);
    }
    if stats.dropped_writes > 0 {
        println!("  {} trace event(s) could not be written", stats.dropped_writes);
    }

    Ok(())
}

fn budget_for(config: &AppConfig) -> ContextBudgetManager {
    ContextBudgetManager::from_config(&config.default_model, &config.context)
}

/// Print the section plan and the first-draft budget for every section.
fn print_plan(
    config: &AppConfig,
    course: &CourseInputs,
    week: u32,
    sections: &[SectionSpec],
) -> Result<(), Box<dyn std::error::Error>> {
    let budget = budget_for(config);
    let limits = budget.limits();

    println!("🔍 Dry run: Week {week}");
    println!("─────────────────────────────────────");
    println!("  Model:       {}", config.default_model);
    println!(
        "  Context:     {} usable of {} tokens",
        limits.usable(),
        limits.total_tokens
    );
    println!(
        "  Cycles:      {} minimum, force-accept at {} revisions",
        config.pipeline.min_iterations, config.pipeline.max_revisions
    );
    println!(
        "  Verify:      {}",
        if config.verification.enabled { "on" } else { "off" }
    );
    println!(
        "  API key:     {}",
        if config.has_api_key() { "configured" } else { "missing" }
    );
    for (name, text) in [
        ("syllabus", &course.syllabus),
        ("template", &course.template),
        ("guidelines", &course.guidelines),
    ] {
        println!("  {name:<12} {} tokens", budget.count(text));
    }

    println!();
    println!("{:<4} {:<32} {:>8} {:>8}  Trimmed", "#", "Section", "Tokens", "Headroom");
    let syllabus = course.syllabus_for(week);
    for section in sections {
        let request = WriteRequest {
            week_number: week,
            section: section.clone(),
            revision: 0,
            previous_draft: None,
            guidance: None,
            prior_sections: Vec::new(),
        };
        let task = prompts::writer_task(&request, Some(sections.len()));
        let sources = PromptSources {
            task: &task,
            syllabus: &syllabus,
            template: &course.template,
            guidelines: &course.guidelines,
            ..PromptSources::default()
        };
        let packed = budget.pack(prompts::WRITER_SYSTEM, standard_components(&budget, &sources))?;
        let report = &packed.report;
        let trimmed: Vec<&str> = report
            .outcomes
            .iter()
            .filter(|(_, o)| *o != ComponentOutcome::Included)
            .map(|(name, _)| name.as_str())
            .collect();
        println!(
            "{:<4} {:<32} {:>8} {:>8}  {}",
            section.ordinal,
            section.title,
            report.final_total,
            report.remaining_headroom,
            if trimmed.is_empty() { "-".to_string() } else { trimmed.join(", ") }
        );
    }

    println!();
    println!("  No content was generated.");
    Ok(())
}
