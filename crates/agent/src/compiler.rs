//! Week compilation and whole-document coherence review.
//!
//! Approved sections are stitched into one Markdown document with a table of
//! contents and a deduplicated reference list. A bounded number of coherence
//! passes may reject the document; an optional reviser then rewrites sections
//! and the document is recompiled. After the last pass the latest compiled
//! document is final whatever the verdict.

use crate::pipeline::markdown;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use weekforge_core::collaborator::{
    CoherenceReviewer, NoopTracer, PersistenceStore, SectionReviser, Tracer,
};
use weekforge_core::error::PipelineError;
use weekforge_core::feedback::Reviewer;
use weekforge_core::review::{ReviewNotes, ReviewPayload};
use weekforge_core::run::{PriorSection, RunState};

/// One section as it goes into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSection {
    pub id: String,
    /// First `#`/`##` heading of the content, else the configured title
    pub title: String,
    pub content: String,
}

impl CompiledSection {
    fn citations(&self) -> Vec<String> {
        markdown::extract_citations(&self.content)
    }
}

/// Result of compiling and reviewing a week.
#[derive(Debug, Clone)]
pub struct CompiledWeek {
    pub document: String,
    /// Where the store put the document, if saving succeeded
    pub location: Option<String>,
    pub coherence_approved: bool,
    /// Coherence passes actually run
    pub passes: u32,
    pub last_review: Option<ReviewNotes>,
}

/// Default week title when none is configured.
pub fn default_title(week_number: u32) -> String {
    format!("Data Science Week {week_number}")
}

/// Lowercase, spaces to `-`, keep only alphanumerics and `-`.
pub fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect()
}

/// Render the week document.
pub fn compile_document(week_number: u32, title: &str, sections: &[CompiledSection]) -> String {
    let mut parts: Vec<String> = vec![
        format!("# Week {week_number}: {title}"),
        String::new(),
        "## Table of Contents".into(),
        String::new(),
    ];
    for section in sections {
        parts.push(format!("- [{}](#{})", section.title, anchor(&section.title)));
    }
    parts.extend([String::new(), "---".into(), String::new()]);

    let mut seen = HashSet::new();
    let mut references = Vec::new();
    for section in sections {
        parts.push(section.content.clone());
        parts.push(String::new());
        for citation in section.citations() {
            if seen.insert(citation.clone()) {
                references.push(citation);
            }
        }
    }

    if !references.is_empty() {
        parts.extend(["## References".into(), String::new()]);
        parts.extend(references);
    }

    parts.join("\n")
}

/// Assembles approved sections and runs the coherence passes.
pub struct WeekCompiler {
    store: Arc<dyn PersistenceStore>,
    coherence: Option<Arc<dyn CoherenceReviewer>>,
    reviser: Option<Arc<dyn SectionReviser>>,
    tracer: Arc<dyn Tracer>,
    passes: u32,
    title: Option<String>,
}

impl WeekCompiler {
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self {
            store,
            coherence: None,
            reviser: None,
            tracer: Arc::new(NoopTracer),
            passes: 2,
            title: None,
        }
    }

    pub fn with_coherence(mut self, reviewer: Arc<dyn CoherenceReviewer>) -> Self {
        self.coherence = Some(reviewer);
        self
    }

    pub fn with_reviser(mut self, reviser: Arc<dyn SectionReviser>) -> Self {
        self.reviser = Some(reviser);
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_passes(mut self, passes: u32) -> Self {
        self.passes = passes;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Compile every approved section in `state`, review, and save.
    pub async fn compile(&self, state: &RunState) -> Result<CompiledWeek, PipelineError> {
        let week = state.week_number();
        let expected = state.sections().len();
        let actual = state.approved().len();
        if expected == 0 {
            return Err(PipelineError::NoSections(week));
        }
        if actual != expected {
            error!(week, expected, actual, "Cannot compile incomplete week");
            self.tracer.step(
                "compile_error",
                "incomplete week",
                json!({ "expected": expected, "actual": actual }),
            );
            return Err(PipelineError::IncompleteWeek { expected, actual });
        }

        let title = self.title.clone().unwrap_or_else(|| default_title(week));
        let mut sections: Vec<CompiledSection> = state
            .approved_sections()
            .map(|(spec, draft)| CompiledSection {
                id: spec.id.clone(),
                title: markdown::first_heading(&draft.content_md)
                    .unwrap_or(spec.title.as_str())
                    .to_string(),
                content: draft.content_md.clone(),
            })
            .collect();

        let mut document = compile_document(week, &title, &sections);
        let mut approved = self.coherence.is_none() || self.passes == 0;
        let mut passes = 0;
        let mut last_review = None;

        if let Some(reviewer) = &self.coherence {
            for pass in 1..=self.passes {
                passes = pass;
                let notes = self.review(reviewer.as_ref(), &document, week).await;
                info!(
                    week,
                    pass,
                    approved = notes.approved,
                    fixes = notes.required_fixes.len(),
                    "Coherence review"
                );
                self.tracer.step(
                    "coherence_review",
                    &format!("pass {pass}"),
                    json!({
                        "approved": notes.approved,
                        "score": notes.quality_score,
                        "fixes": notes.required_fixes.len(),
                        "fallback": notes.is_fallback(),
                    }),
                );

                approved = notes.approved;
                let another_pass = !approved && pass < self.passes;
                if another_pass {
                    self.revise(&mut sections, &notes).await;
                    document = compile_document(week, &title, &sections);
                }
                last_review = Some(notes);
                if !another_pass {
                    break;
                }
            }
        }

        let location = match self.store.save_week(week, &document).await {
            Ok(location) => {
                info!(week, %location, approved, "Week compiled");
                Some(location)
            }
            Err(e) => {
                warn!(week, error = %e, "Failed to save compiled week");
                None
            }
        };
        self.tracer.step(
            "week_compiled",
            &title,
            json!({
                "sections": sections.len(),
                "words": markdown::word_count(&document),
                "coherence_approved": approved,
                "passes": passes,
            }),
        );

        Ok(CompiledWeek {
            document,
            location,
            coherence_approved: approved,
            passes,
            last_review,
        })
    }

    async fn review(
        &self,
        reviewer: &dyn CoherenceReviewer,
        document: &str,
        week: u32,
    ) -> ReviewNotes {
        match reviewer.review(document, week).await {
            Ok(ReviewPayload::Parsed(mut notes)) => {
                notes.reviewer = Reviewer::Coherence;
                notes
            }
            Ok(payload @ ReviewPayload::Unparseable { .. }) => {
                warn!(week, "Coherence review could not be parsed, treating as approval");
                payload.into_notes(Reviewer::Coherence)
            }
            Err(e) => {
                warn!(week, error = %e, "Coherence reviewer unavailable");
                ReviewNotes::unavailable(Reviewer::Coherence, e.to_string())
            }
        }
    }

    async fn revise(&self, sections: &mut [CompiledSection], notes: &ReviewNotes) {
        let Some(reviser) = &self.reviser else {
            return;
        };
        let prior: Vec<PriorSection> = sections
            .iter()
            .map(|s| PriorSection {
                id: s.id.clone(),
                title: s.title.clone(),
                content: s.content.clone(),
            })
            .collect();

        match reviser.revise(&prior, notes).await {
            Ok(revised) => {
                let mut changed = 0;
                for section in sections.iter_mut() {
                    if let Some(content) = revised.get(&section.id) {
                        if let Some(heading) = markdown::first_heading(content) {
                            section.title = heading.to_string();
                        }
                        section.content = content.clone();
                        changed += 1;
                    }
                }
                debug!(changed, "Applied coherence revisions");
            }
            Err(e) => warn!(error = %e, "Section reviser failed, recompiling unchanged"),
        }
    }
}
