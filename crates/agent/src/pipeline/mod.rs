//! The per-section state machine.
//!
//! Each section moves through the same cycle:
//!
//! 1. **Draft**: the writer produces Markdown (or a placeholder on failure)
//! 2. **Compliance review**: structural review, then mechanical direct edits
//! 3. **Learner review**: link and dataset checks feed a usability review
//! 4. **Gate**: accept, force-accept at the revision limit, or revise with
//!    prioritized guidance
//!
//! Collaborator failures never abort the run. They become neutral fallbacks
//! and the revision limit guarantees every section terminates.

pub mod edits;
pub mod gate;
pub mod markdown;

pub use edits::{EditOutcome, apply_edits};
pub use gate::{Gate, GateDecision};

use crate::feedback::{FeedbackPlan, FeedbackPrioritizer};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use weekforge_config::AppConfig;
use weekforge_core::collaborator::{
    ComplianceReviewer, ContentWriter, DatasetVerifier, LearnerReviewer, LinkVerifier,
    NoopTracer, PersistenceStore, ReviewRules, Tracer, WriteRequest,
};
use weekforge_core::error::GenerationError;
use weekforge_core::feedback::Reviewer;
use weekforge_core::review::{DatasetReport, LinkCheckReport, ReviewNotes, ReviewPayload};
use weekforge_core::run::{
    FeedbackMemoryEntry, PriorSection, RevisionGuidance, RunState, ScoreRecord, SectionOutcome,
    SectionStatus,
};
use weekforge_core::section::{SectionDraft, SectionSpec};

/// Issues carried into the writer's revision guidance.
const GUIDANCE_TOP_ISSUES: usize = 5;

/// Feedback-memory entries carried into the writer's revision guidance.
const GUIDANCE_MEMORY: usize = 10;

/// Tunables for the revise loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub gate: Gate,
    pub preserve_score_threshold: f32,
    pub regression_tolerance: f32,
    /// Run link and dataset checks before the learner review
    pub verify: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            gate: Gate::default(),
            preserve_score_threshold: 7.0,
            regression_tolerance: 0.5,
            verify: true,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            gate: Gate::from_config(&config.pipeline),
            preserve_score_threshold: config.pipeline.preserve_score_threshold,
            regression_tolerance: config.pipeline.regression_tolerance,
            verify: config.verification.enabled,
        }
    }
}

/// Link and dataset checkers consulted before the learner review.
#[derive(Clone)]
struct Verifiers {
    links: Arc<dyn LinkVerifier>,
    datasets: Arc<dyn DatasetVerifier>,
}

/// Drives every section of a week through draft → review → gate.
pub struct SectionPipeline {
    writer: Arc<dyn ContentWriter>,
    compliance: Arc<dyn ComplianceReviewer>,
    learner: Arc<dyn LearnerReviewer>,
    store: Arc<dyn PersistenceStore>,
    verifiers: Option<Verifiers>,
    tracer: Arc<dyn Tracer>,
    rules: ReviewRules,
    settings: PipelineSettings,
    prioritizer: FeedbackPrioritizer,
}

impl SectionPipeline {
    pub fn new(
        writer: Arc<dyn ContentWriter>,
        compliance: Arc<dyn ComplianceReviewer>,
        learner: Arc<dyn LearnerReviewer>,
        store: Arc<dyn PersistenceStore>,
    ) -> Self {
        Self {
            writer,
            compliance,
            learner,
            store,
            verifiers: None,
            tracer: Arc::new(NoopTracer),
            rules: ReviewRules::default(),
            settings: PipelineSettings::default(),
            prioritizer: FeedbackPrioritizer::new(),
        }
    }

    /// Attach link and dataset verification. Without it the learner sees empty reports.
    pub fn with_verifiers(
        mut self,
        links: Arc<dyn LinkVerifier>,
        datasets: Arc<dyn DatasetVerifier>,
    ) -> Self {
        self.verifiers = Some(Verifiers { links, datasets });
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Template and multimedia rules handed to the compliance reviewer.
    pub fn with_rules(mut self, rules: ReviewRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    /// Run every remaining section in `state` to a terminal state.
    pub async fn run(&self, state: &mut RunState) -> Vec<SectionOutcome> {
        let mut outcomes = Vec::with_capacity(state.sections().len());
        while let Some(outcome) = self.run_section(state).await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Run the current section until it is accepted or force-accepted.
    ///
    /// Returns `None` when no sections remain.
    pub async fn run_section(&self, state: &mut RunState) -> Option<SectionOutcome> {
        let spec = state.current_section()?.clone();
        let week = state.week_number();
        let max_revisions = self.settings.gate.max_revisions;

        info!(
            week,
            section = %spec.id,
            ordinal = spec.ordinal,
            "Starting section"
        );
        self.tracer.step(
            "section_start",
            &spec.title,
            json!({ "section": spec.id, "ordinal": spec.ordinal }),
        );

        let prior_sections = self.prior_sections(state).await;
        let mut guidance: Option<RevisionGuidance> = None;

        loop {
            let revision = state.revision_count();

            // ── Drafting ──
            let request = WriteRequest {
                week_number: week,
                section: spec.clone(),
                revision,
                previous_draft: if revision > 0 {
                    state.current_draft().cloned()
                } else {
                    None
                },
                guidance: guidance.take(),
                prior_sections: prior_sections.clone(),
            };
            let written = self.draft(state, &spec, &request).await;
            state.set_draft(written.clone());

            // ── Compliance review + direct edits ──
            let compliance = self.review_compliance(state, &written, &spec).await;
            if !compliance.direct_edits.is_empty()
                && let Some(draft) = state.current_draft_mut()
            {
                let outcomes = apply_edits(draft, &compliance.direct_edits);
                let applied = outcomes.iter().filter(|o| o.applied).count();
                debug!(
                    section = %spec.id,
                    applied,
                    skipped = outcomes.len() - applied,
                    "Applied direct edits"
                );
                self.tracer.step(
                    "direct_edits",
                    &format!("{applied}/{} edits applied", outcomes.len()),
                    json!({ "section": spec.id, "outcomes": outcomes }),
                );
            }
            state.set_compliance_review(compliance.clone());

            // ── Learner review ──
            let draft = state.current_draft().cloned().unwrap_or_default();
            let (links, datasets) = self.verify(&spec, &draft).await;
            let learner = self.review_learner(state, &draft, &links, &datasets).await;
            state.set_learner_review(learner.clone());

            // ── Scores ──
            let best_before = state.best_score_for(&spec.id);
            let record = ScoreRecord::from_reviews(&spec.id, revision, &compliance, &learner);
            if let Some(score) = record.combined {
                state.offer_best_draft(score, &draft);
            }
            state.record_score(record.clone());
            info!(
                section = %spec.id,
                revision,
                compliance = compliance.approved,
                learner = learner.approved,
                score = ?record.combined,
                "Review cycle complete"
            );
            self.tracer.step(
                "review_cycle",
                &format!("{} revision {revision}", spec.title),
                json!({ "section": spec.id, "score": record }),
            );

            // ── Gate ──
            let plan = self
                .prioritizer
                .prioritize(&compliance, &learner, revision, max_revisions);
            debug!(
                section = %spec.id,
                action = ?plan.strategy.action,
                reason = %plan.strategy.reason,
                issues = plan.summary.total_issues,
                "Feedback prioritized"
            );
            self.tracer.step(
                "revision_analysis",
                &plan.strategy.reason,
                json!({ "section": spec.id, "summary": plan.summary, "strategy": plan.strategy }),
            );

            match self
                .settings
                .gate
                .decide(revision, compliance.approved, learner.approved)
            {
                GateDecision::Accept => {
                    let reason = format!("approved by both reviewers after {} cycles", revision + 1);
                    return Some(
                        self.finish(state, &spec, draft, SectionStatus::Accepted, record.combined, reason)
                            .await,
                    );
                }
                GateDecision::ForceAccept => {
                    let (final_draft, score) = match state.best_draft() {
                        Some((best, best_draft))
                            if record.combined.is_none_or(|current| best > current) =>
                        {
                            info!(section = %spec.id, best, "Force-accepting best-scoring draft");
                            (best_draft.clone(), Some(best))
                        }
                        _ => (draft, record.combined),
                    };
                    warn!(section = %spec.id, revision, "Maximum revisions reached, force-accepting");
                    return Some(
                        self.finish(
                            state,
                            &spec,
                            final_draft,
                            SectionStatus::ForceAccepted,
                            score,
                            "maximum revisions reached".to_string(),
                        )
                        .await,
                    );
                }
                GateDecision::Revise => {
                    self.remember_fixes(state, &spec, &compliance, &learner);
                    let rolled_back = self.roll_back_if_regressed(state, &spec, &record, best_before);
                    guidance = Some(self.guidance(state, &plan, &compliance, &learner, rolled_back));
                    state.begin_revision();
                    debug!(
                        section = %spec.id,
                        revision = state.revision_count(),
                        focus = ?plan.focus_areas(),
                        "Revising section"
                    );
                }
            }
        }
    }

    /// Sections accepted so far, from the store when it answers.
    async fn prior_sections(&self, state: &mut RunState) -> Vec<PriorSection> {
        match self.store.load_prior_sections(state.week_number()).await {
            Ok(sections) => sections,
            Err(e) => {
                warn!(error = %e, "Failed to load prior sections, using this run's approvals");
                state.note_error();
                state
                    .approved_sections()
                    .map(|(spec, draft)| PriorSection {
                        id: spec.id.clone(),
                        title: spec.title.clone(),
                        content: draft.content_md.clone(),
                    })
                    .collect()
            }
        }
    }

    async fn draft(
        &self,
        state: &mut RunState,
        spec: &SectionSpec,
        request: &WriteRequest,
    ) -> SectionDraft {
        match self.writer.write(request).await {
            Ok(content) => {
                let draft = markdown::derive_draft(&spec.id, content);
                debug!(
                    section = %spec.id,
                    revision = request.revision,
                    words = draft.word_count,
                    links = draft.links.len(),
                    "Draft written"
                );
                self.tracer.step(
                    "draft",
                    &format!("{} revision {}", spec.title, request.revision),
                    json!({ "section": spec.id, "words": draft.word_count }),
                );
                draft
            }
            Err(e) => {
                warn!(section = %spec.id, error = %e, "Writer failed, using placeholder");
                state.note_fallback();
                self.tracer.step(
                    "draft",
                    "writer failed",
                    json!({ "section": spec.id, "fallback": true, "error": e.to_string() }),
                );
                let mut draft = SectionDraft::placeholder(spec, &e.to_string());
                markdown::refresh(&mut draft);
                draft
            }
        }
    }

    async fn review_compliance(
        &self,
        state: &mut RunState,
        draft: &SectionDraft,
        spec: &SectionSpec,
    ) -> ReviewNotes {
        let result = self.compliance.review(draft, spec, &self.rules).await;
        self.resolve(state, Reviewer::Compliance, result)
    }

    async fn review_learner(
        &self,
        state: &mut RunState,
        draft: &SectionDraft,
        links: &LinkCheckReport,
        datasets: &DatasetReport,
    ) -> ReviewNotes {
        let result = self.learner.review(draft, links, datasets).await;
        let mut notes = self.resolve(state, Reviewer::Learner, result);
        if notes.link_check_results.is_empty() {
            notes.link_check_results = links.results.clone();
        }
        notes
    }

    /// Turn a reviewer's answer into notes, substituting fallbacks.
    fn resolve(
        &self,
        state: &mut RunState,
        reviewer: Reviewer,
        result: Result<ReviewPayload, GenerationError>,
    ) -> ReviewNotes {
        match result {
            Ok(ReviewPayload::Parsed(mut notes)) => {
                notes.reviewer = reviewer;
                notes
            }
            Ok(payload @ ReviewPayload::Unparseable { .. }) => {
                warn!(%reviewer, "Review response could not be parsed, treating as approval");
                state.note_fallback();
                let notes = payload.into_notes(reviewer);
                self.tracer.step(
                    "review_parse_failure",
                    notes.note.as_deref().unwrap_or_default(),
                    json!({ "reviewer": reviewer, "fallback": true }),
                );
                notes
            }
            Err(e) => {
                warn!(%reviewer, error = %e, "Reviewer unavailable");
                state.note_fallback();
                self.tracer.step(
                    "review_unavailable",
                    &e.to_string(),
                    json!({ "reviewer": reviewer, "fallback": true }),
                );
                ReviewNotes::unavailable(reviewer, e.to_string())
            }
        }
    }

    async fn verify(
        &self,
        spec: &SectionSpec,
        draft: &SectionDraft,
    ) -> (LinkCheckReport, DatasetReport) {
        let Some(verifiers) = self.verifiers.as_ref().filter(|_| self.settings.verify) else {
            return (LinkCheckReport::default(), DatasetReport::default());
        };

        let links = verifiers.links.verify_all(&draft.links).await;
        let datasets = verifiers.datasets.verify_all(&draft.content_md).await;
        let broken = links.broken().count();
        let inaccessible = datasets.inaccessible().count();
        if broken > 0 || inaccessible > 0 {
            info!(section = %spec.id, broken, inaccessible, "Verification found problems");
        }
        self.tracer.step(
            "verification",
            &format!("{} links, {} datasets", links.results.len(), datasets.datasets.len()),
            json!({ "section": spec.id, "broken_links": broken, "inaccessible_datasets": inaccessible }),
        );
        (links, datasets)
    }

    /// Append outstanding fixes to the run-wide memory, compliance first.
    fn remember_fixes(
        &self,
        state: &mut RunState,
        spec: &SectionSpec,
        compliance: &ReviewNotes,
        learner: &ReviewNotes,
    ) {
        for notes in [compliance, learner] {
            if notes.approved {
                continue;
            }
            for fix in &notes.required_fixes {
                state.remember(FeedbackMemoryEntry {
                    source: notes.reviewer,
                    section_title: spec.title.clone(),
                    issue: fix.clone(),
                });
            }
        }
    }

    /// Restore the best-scoring draft when this cycle's score regressed.
    fn roll_back_if_regressed(
        &self,
        state: &mut RunState,
        spec: &SectionSpec,
        record: &ScoreRecord,
        best_before: Option<f32>,
    ) -> bool {
        let (Some(best), Some(current)) = (best_before, record.combined) else {
            return false;
        };
        if current >= best - self.settings.regression_tolerance {
            return false;
        }
        let Some((_, best_draft)) = state.best_draft() else {
            return false;
        };
        let best_draft = best_draft.clone();

        warn!(
            section = %spec.id,
            best,
            current,
            "Quality regressed, rolling back to best draft"
        );
        self.tracer.step(
            "quality_regression",
            &format!("{current:.1} < {best:.1}"),
            json!({ "section": spec.id, "best": best, "current": current, "revision": record.revision }),
        );
        state.set_draft(best_draft);
        true
    }

    fn guidance(
        &self,
        state: &RunState,
        plan: &FeedbackPlan,
        compliance: &ReviewNotes,
        learner: &ReviewNotes,
        rolled_back: bool,
    ) -> RevisionGuidance {
        let next = state.revision_count() + 1;
        let threshold = self.settings.preserve_score_threshold;

        // A dimension scored by both reviewers keeps the lower score.
        let mut dimensions: BTreeMap<String, f32> = BTreeMap::new();
        for (name, score) in compliance.scores.iter().chain(learner.scores.iter()) {
            dimensions
                .entry(name.clone())
                .and_modify(|s| *s = s.min(*score))
                .or_insert(*score);
        }
        let (preserve, must_fix): (BTreeMap<_, _>, BTreeMap<_, _>) = dimensions
            .into_iter()
            .partition(|(_, score)| *score >= threshold);

        let outstanding = |notes: &ReviewNotes| {
            if notes.approved {
                Vec::new()
            } else {
                notes.required_fixes.clone()
            }
        };

        RevisionGuidance {
            revision: next,
            remaining_revisions: self.settings.gate.max_revisions.saturating_sub(next),
            focus_areas: plan.focus_areas().to_vec(),
            top_issues: plan.feedback.iter().take(GUIDANCE_TOP_ISSUES).cloned().collect(),
            compliance_fixes: outstanding(compliance),
            learner_fixes: outstanding(learner),
            preserve,
            must_fix,
            memory: state.recent_memory(GUIDANCE_MEMORY).to_vec(),
            rolled_back,
        }
    }

    async fn finish(
        &self,
        state: &mut RunState,
        spec: &SectionSpec,
        draft: SectionDraft,
        status: SectionStatus,
        final_score: Option<f32>,
        reason: String,
    ) -> SectionOutcome {
        let revisions = state.revision_count();
        match self.store.save_draft(state.week_number(), &draft).await {
            Ok(location) => debug!(section = %spec.id, %location, "Saved accepted draft"),
            Err(e) => {
                warn!(section = %spec.id, error = %e, "Failed to save accepted draft");
                state.note_error();
            }
        }

        info!(
            section = %spec.id,
            ?status,
            revisions,
            score = ?final_score,
            "Section finished"
        );
        self.tracer.step(
            "section_complete",
            &reason,
            json!({ "section": spec.id, "status": status, "revisions": revisions }),
        );

        state.accept(draft);
        SectionOutcome {
            section_id: spec.id.clone(),
            title: spec.title.clone(),
            status,
            revisions,
            cycles: revisions + 1,
            final_score,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{PassingVerifier, ScriptedReviewer, ScriptedWriter, Verdict, sections};
    use weekforge_core::feedback::FeedbackPriority;
    use weekforge_core::review::{DirectEdit, DirectEditKind};
    use weekforge_memory::InMemoryStore;
    use weekforge_telemetry::RecordingTracer;

    fn pipeline(
        writer: Arc<ScriptedWriter>,
        compliance: Arc<ScriptedReviewer>,
        learner: Arc<ScriptedReviewer>,
        store: Arc<InMemoryStore>,
    ) -> SectionPipeline {
        SectionPipeline::new(writer, compliance, learner, store)
    }

    fn setup(
        compliance: Vec<Verdict>,
        learner: Vec<Verdict>,
    ) -> (SectionPipeline, Arc<ScriptedWriter>, Arc<ScriptedReviewer>, Arc<ScriptedReviewer>) {
        let writer = Arc::new(ScriptedWriter::echo());
        let c = Arc::new(ScriptedReviewer::new(compliance));
        let l = Arc::new(ScriptedReviewer::new(learner));
        let p = pipeline(writer.clone(), c.clone(), l.clone(), Arc::new(InMemoryStore::new()));
        (p, writer, c, l)
    }

    #[tokio::test]
    async fn early_approval_waits_for_minimum_cycles() {
        let (pipeline, writer, _, _) = setup(vec![Verdict::approve(8.0)], vec![Verdict::approve(8.0)]);
        let mut state = RunState::new(1, sections(1));

        let outcome = pipeline.run_section(&mut state).await.unwrap();

        assert_eq!(outcome.status, SectionStatus::Accepted);
        assert_eq!(outcome.cycles, 3);
        assert_eq!(outcome.revisions, 2);
        assert_eq!(writer.call_count(), 3);
        assert!(state.is_complete());
        assert!(!state.approved()[0].needs_revision);
    }

    #[tokio::test]
    async fn rejection_forever_force_accepts_at_limit() {
        let (pipeline, writer, _, _) = setup(
            vec![Verdict::reject(4.0, &["Missing required WLO mapping"])],
            vec![Verdict::reject(4.0, &["Confusing explanation"])],
        );
        let mut state = RunState::new(1, sections(1));

        let outcome = pipeline.run_section(&mut state).await.unwrap();

        assert_eq!(outcome.status, SectionStatus::ForceAccepted);
        assert_eq!(outcome.reason, "maximum revisions reached");
        assert_eq!(writer.call_count(), 6);
        assert_eq!(state.score_history().len(), 6);
        // five revise cycles, two fixes each
        assert_eq!(state.feedback_memory().len(), 10);
    }

    #[tokio::test]
    async fn memory_keeps_compliance_before_learner() {
        let (pipeline, _, _, _) = setup(
            vec![Verdict::reject(5.0, &["Template heading missing"])],
            vec![Verdict::reject(5.0, &["Unclear example"])],
        );
        let mut state = RunState::new(1, sections(1));
        pipeline.run_section(&mut state).await;

        let memory = state.feedback_memory();
        assert_eq!(memory[0].source, Reviewer::Compliance);
        assert_eq!(memory[1].source, Reviewer::Learner);
        assert_eq!(memory[0].section_title, "Part 1");
    }

    #[tokio::test]
    async fn failures_become_fallbacks_and_still_terminate() {
        let writer = Arc::new(ScriptedWriter::failing());
        let c = Arc::new(ScriptedReviewer::always(Verdict::Fail));
        let l = Arc::new(ScriptedReviewer::always(Verdict::Fail));
        let tracer = Arc::new(RecordingTracer::new());
        let pipeline = pipeline(writer, c, l, Arc::new(InMemoryStore::new()))
            .with_tracer(tracer.clone());
        let mut state = RunState::new(2, sections(1));

        let outcome = pipeline.run_section(&mut state).await.unwrap();

        assert_eq!(outcome.status, SectionStatus::ForceAccepted);
        // writer + two reviewers per cycle, six cycles
        assert_eq!(state.fallback_count(), 18);
        assert_eq!(tracer.stats().fallbacks, 18);
        assert!(state.approved()[0].content_md.contains("Content unavailable"));
    }

    #[tokio::test]
    async fn garbled_reviews_count_as_approval() {
        let (pipeline, _, _, _) = setup(vec![Verdict::Garbled], vec![Verdict::Garbled]);
        let mut state = RunState::new(1, sections(1));

        let outcome = pipeline.run_section(&mut state).await.unwrap();

        assert_eq!(outcome.status, SectionStatus::Accepted);
        assert_eq!(state.fallback_count(), 6);
    }

    #[tokio::test]
    async fn revision_guidance_reaches_writer() {
        let compliance = ReviewNotes::new(Reviewer::Compliance, false)
            .with_score(5.0)
            .with_dimension("template_compliance", 4.0)
            .with_dimension("objective_alignment", 8.5)
            .with_fixes(["Missing required assessment rubric"]);
        let (pipeline, writer, _, _) = setup(
            vec![Verdict::Notes(compliance), Verdict::approve(8.0)],
            vec![Verdict::approve(8.0)],
        );
        let mut state = RunState::new(1, sections(1));
        pipeline.run_section(&mut state).await;

        let requests = writer.requests();
        assert!(requests[0].guidance.is_none());
        assert!(!requests[0].is_revision());

        let guidance = requests[1].guidance.as_ref().unwrap();
        assert!(requests[1].is_revision());
        assert_eq!(guidance.revision, 1);
        assert_eq!(guidance.remaining_revisions, 4);
        assert_eq!(guidance.top_issues[0].priority, FeedbackPriority::Critical);
        assert_eq!(guidance.compliance_fixes.len(), 1);
        assert!(guidance.learner_fixes.is_empty());
        assert!(guidance.preserve.contains_key("objective_alignment"));
        assert!(guidance.must_fix.contains_key("template_compliance"));
        assert_eq!(guidance.memory.len(), 1);
    }

    #[tokio::test]
    async fn regression_rolls_back_to_best_draft() {
        let writer = Arc::new(ScriptedWriter::new(vec![
            Some("## Part 1\n\nStrong first draft.\n".into()),
            Some("## Part 1\n\nWeaker rewrite.\n".into()),
            Some("## Part 1\n\nThird try.\n".into()),
        ]));
        let c = Arc::new(ScriptedReviewer::new(vec![
            Verdict::reject(9.0, &["Add a figure"]),
            Verdict::reject(5.0, &["Add a figure"]),
            Verdict::approve(8.0),
        ]));
        let l = Arc::new(ScriptedReviewer::new(vec![
            Verdict::reject(9.0, &["Unclear intro"]),
            Verdict::reject(5.0, &["Unclear intro"]),
            Verdict::approve(8.0),
        ]));
        let tracer = Arc::new(RecordingTracer::new());
        let pipeline = pipeline(writer.clone(), c, l, Arc::new(InMemoryStore::new()))
            .with_tracer(tracer.clone());
        let mut state = RunState::new(1, sections(1));
        pipeline.run_section(&mut state).await;

        assert_eq!(tracer.count("quality_regression"), 1);
        let third = &writer.requests()[2];
        let previous = third.previous_draft.as_ref().unwrap();
        assert!(previous.content_md.contains("Strong first draft"));
        assert!(third.guidance.as_ref().unwrap().rolled_back);
    }

    #[tokio::test]
    async fn force_accept_prefers_best_draft() {
        let writer = Arc::new(ScriptedWriter::new(vec![
            Some("## Part 1\n\nBest version.\n".into()),
            Some("## Part 1\n\nWorse version.\n".into()),
        ]));
        let c = Arc::new(ScriptedReviewer::new(vec![
            Verdict::reject(7.0, &["Fix format"]),
            Verdict::reject(6.8, &["Fix format"]),
        ]));
        let l = Arc::new(ScriptedReviewer::always(Verdict::reject(7.0, &["Fix flow"])));
        let pipeline = pipeline(writer, c, l, Arc::new(InMemoryStore::new())).with_settings(
            PipelineSettings {
                gate: Gate::new(3, 1),
                ..PipelineSettings::default()
            },
        );
        let mut state = RunState::new(1, sections(1));

        let outcome = pipeline.run_section(&mut state).await.unwrap();

        assert_eq!(outcome.status, SectionStatus::ForceAccepted);
        assert_eq!(outcome.final_score, Some(7.0));
        assert!(state.approved()[0].content_md.contains("Best version"));
    }

    #[tokio::test]
    async fn direct_edits_apply_before_learner_review() {
        let writer = Arc::new(ScriptedWriter::new(vec![Some(
            "## Part 1\n\nSee [the guide](http://old.example.com/guide).\n".into(),
        )]));
        let edit = DirectEdit::new(DirectEditKind::CitationFix, "Part 1")
            .replacing("http://old.example.com/guide", "https://new.example.com/guide");
        let c = Arc::new(ScriptedReviewer::always(Verdict::Notes(
            ReviewNotes::new(Reviewer::Compliance, true)
                .with_score(8.0)
                .with_edit(edit),
        )));
        let l = Arc::new(ScriptedReviewer::always(Verdict::approve(8.0)));
        let verifier = Arc::new(PassingVerifier::default());
        let pipeline = pipeline(writer, c, l.clone(), Arc::new(InMemoryStore::new()))
            .with_verifiers(verifier.clone(), verifier.clone());
        let mut state = RunState::new(1, sections(1));
        pipeline.run_section(&mut state).await;

        assert!(l.seen()[0].contains("https://new.example.com/guide"));
        assert_eq!(state.approved()[0].links, vec!["https://new.example.com/guide"]);
        assert_eq!(verifier.link_calls(), 3);
    }

    #[tokio::test]
    async fn verification_can_be_disabled() {
        let (pipeline, _, _, _) = setup(vec![Verdict::approve(8.0)], vec![Verdict::approve(8.0)]);
        let verifier = Arc::new(PassingVerifier::default());
        let pipeline = pipeline
            .with_verifiers(verifier.clone(), verifier.clone())
            .with_settings(PipelineSettings {
                verify: false,
                ..PipelineSettings::default()
            });
        let mut state = RunState::new(1, sections(1));
        pipeline.run_section(&mut state).await;
        assert_eq!(verifier.link_calls(), 0);
    }

    #[tokio::test]
    async fn run_covers_every_section_and_passes_prior_context() {
        let (pipeline, writer, _, _) = setup(vec![Verdict::approve(8.0)], vec![Verdict::approve(8.0)]);
        let mut state = RunState::new(4, sections(3));

        let outcomes = pipeline.run(&mut state).await;

        assert_eq!(outcomes.len(), 3);
        assert!(state.is_complete());
        assert_eq!(state.approved().len(), 3);
        let last_first_write = writer
            .requests()
            .into_iter()
            .find(|r| r.section.id == "03-part")
            .unwrap();
        assert_eq!(last_first_write.prior_sections.len(), 2);
        assert_eq!(last_first_write.prior_sections[0].id, "01-part");
    }

    #[tokio::test]
    async fn exhausted_state_returns_none() {
        let (pipeline, _, _, _) = setup(vec![Verdict::approve(8.0)], vec![Verdict::approve(8.0)]);
        let mut state = RunState::new(1, Vec::new());
        assert!(pipeline.run_section(&mut state).await.is_none());
        assert!(pipeline.run(&mut state).await.is_empty());
    }
}
