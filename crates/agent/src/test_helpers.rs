//! Scripted collaborators shared by the pipeline and compiler tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use weekforge_core::collaborator::{
    CoherenceReviewer, ComplianceReviewer, ContentWriter, DatasetVerifier, LearnerReviewer,
    LinkVerifier, ReviewRules, SectionReviser, WriteRequest,
};
use weekforge_core::error::GenerationError;
use weekforge_core::feedback::Reviewer;
use weekforge_core::review::{
    DatasetReport, LinkCheckReport, LinkCheckResult, ReviewNotes, ReviewPayload,
};
use weekforge_core::run::PriorSection;
use weekforge_core::section::{SectionDraft, SectionSpec};

/// Take the next scripted item; the last one repeats once the script runs out.
fn next_scripted<T: Clone>(script: &Mutex<Vec<T>>, count: &Mutex<usize>) -> T {
    let mut count = count.lock().unwrap();
    let script = script.lock().unwrap();
    assert!(!script.is_empty(), "scripted collaborator has no responses");
    let item = script[(*count).min(script.len() - 1)].clone();
    *count += 1;
    item
}

// ── Writer ────────────────────────────────────────────────────────────────

/// Returns scripted Markdown and records every request it receives.
///
/// A response of `None` makes that call fail. With an empty script every
/// call echoes a short section built from the request.
pub struct ScriptedWriter {
    responses: Mutex<Vec<Option<String>>>,
    call_count: Mutex<usize>,
    requests: Mutex<Vec<WriteRequest>>,
}

impl ScriptedWriter {
    pub fn new(responses: Vec<Option<String>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call returns a short section named after the requested title.
    pub fn echo() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing() -> Self {
        Self::new(vec![None])
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn requests(&self) -> Vec<WriteRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentWriter for ScriptedWriter {
    async fn write(&self, request: &WriteRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.responses.lock().unwrap().is_empty() {
            *self.call_count.lock().unwrap() += 1;
            return Ok(format!(
                "## {}\n\nRevision {} covering WLO1. See [docs](https://example.org/{}).\n",
                request.section.title, request.revision, request.section.id
            ));
        }
        match next_scripted(&self.responses, &self.call_count) {
            Some(text) => Ok(text),
            None => Err(GenerationError::Network("connection reset".into())),
        }
    }
}

// ── Reviewers ─────────────────────────────────────────────────────────────

/// One scripted reviewer response.
#[derive(Debug, Clone)]
pub enum Verdict {
    Notes(ReviewNotes),
    Garbled,
    Fail,
}

impl Verdict {
    pub fn approve(score: f32) -> Self {
        Self::Notes(ReviewNotes::new(Reviewer::Compliance, true).with_score(score))
    }

    pub fn reject(score: f32, fixes: &[&str]) -> Self {
        Self::Notes(
            ReviewNotes::new(Reviewer::Compliance, false)
                .with_score(score)
                .with_fixes(fixes.iter().copied()),
        )
    }

    fn into_result(self, reviewer: Reviewer) -> Result<ReviewPayload, GenerationError> {
        match self {
            Self::Notes(mut notes) => {
                notes.reviewer = reviewer;
                Ok(ReviewPayload::Parsed(notes))
            }
            Self::Garbled => Ok(ReviewPayload::Unparseable {
                raw: "I think it looks fine overall".into(),
            }),
            Self::Fail => Err(GenerationError::Timeout("review timed out".into())),
        }
    }
}

/// Plays compliance, learner, or coherence reviewer from a script.
pub struct ScriptedReviewer {
    verdicts: Mutex<Vec<Verdict>>,
    call_count: Mutex<usize>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedReviewer {
    pub fn new(verdicts: Vec<Verdict>) -> Self {
        Self {
            verdicts: Mutex::new(verdicts),
            call_count: Mutex::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn always(verdict: Verdict) -> Self {
        Self::new(vec![verdict])
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// The Markdown of every draft or document reviewed, in order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn next(&self, reviewed: &str, reviewer: Reviewer) -> Result<ReviewPayload, GenerationError> {
        self.seen.lock().unwrap().push(reviewed.to_string());
        next_scripted(&self.verdicts, &self.call_count).into_result(reviewer)
    }
}

#[async_trait]
impl ComplianceReviewer for ScriptedReviewer {
    async fn review(
        &self,
        draft: &SectionDraft,
        _spec: &SectionSpec,
        _rules: &ReviewRules,
    ) -> Result<ReviewPayload, GenerationError> {
        self.next(&draft.content_md, Reviewer::Compliance)
    }
}

#[async_trait]
impl LearnerReviewer for ScriptedReviewer {
    async fn review(
        &self,
        draft: &SectionDraft,
        _links: &LinkCheckReport,
        _datasets: &DatasetReport,
    ) -> Result<ReviewPayload, GenerationError> {
        self.next(&draft.content_md, Reviewer::Learner)
    }
}

#[async_trait]
impl CoherenceReviewer for ScriptedReviewer {
    async fn review(
        &self,
        document: &str,
        _week_number: u32,
    ) -> Result<ReviewPayload, GenerationError> {
        self.next(document, Reviewer::Coherence)
    }
}

// ── Reviser and verifiers ─────────────────────────────────────────────────

/// Appends a marker line to every section it is asked to revise.
#[derive(Default)]
pub struct MarkingReviser {
    call_count: Mutex<usize>,
}

impl MarkingReviser {
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl SectionReviser for MarkingReviser {
    async fn revise(
        &self,
        sections: &[PriorSection],
        _notes: &ReviewNotes,
    ) -> Result<BTreeMap<String, String>, GenerationError> {
        *self.call_count.lock().unwrap() += 1;
        Ok(sections
            .iter()
            .map(|s| (s.id.clone(), format!("{}\nRevised for flow.\n", s.content)))
            .collect())
    }
}

/// Renames every section's heading to `"{prefix} {old heading}"`.
pub struct RetitlingReviser {
    pub prefix: &'static str,
}

#[async_trait]
impl SectionReviser for RetitlingReviser {
    async fn revise(
        &self,
        sections: &[PriorSection],
        _notes: &ReviewNotes,
    ) -> Result<BTreeMap<String, String>, GenerationError> {
        Ok(sections
            .iter()
            .map(|s| {
                let body = s.content.replacen("## ", &format!("## {} ", self.prefix), 1);
                (s.id.clone(), body)
            })
            .collect())
    }
}

/// Reports every link as working and never finds datasets.
#[derive(Default)]
pub struct PassingVerifier {
    link_calls: Mutex<usize>,
}

impl PassingVerifier {
    pub fn link_calls(&self) -> usize {
        *self.link_calls.lock().unwrap()
    }
}

#[async_trait]
impl LinkVerifier for PassingVerifier {
    async fn verify_all(&self, urls: &[String]) -> LinkCheckReport {
        *self.link_calls.lock().unwrap() += 1;
        LinkCheckReport {
            results: urls
                .iter()
                .map(|url| LinkCheckResult {
                    url: url.clone(),
                    ok: true,
                    status: Some(200),
                    error: None,
                    rounds_passed: 1,
                    rounds: 1,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl DatasetVerifier for PassingVerifier {
    async fn verify_all(&self, _markdown: &str) -> DatasetReport {
        DatasetReport::default()
    }
}

pub fn sections(n: usize) -> Vec<SectionSpec> {
    (1..=n)
        .map(|i| SectionSpec::new(format!("0{i}-part"), format!("Part {i}")).with_ordinal(i))
        .collect()
}
