//! System prompts and user-text builders for each generation role.

use std::fmt::Write as _;
use weekforge_core::collaborator::{ReviewRules, WriteRequest};
use weekforge_core::review::{DatasetReport, LinkCheckReport, ReviewNotes};
use weekforge_core::run::{PriorSection, RevisionGuidance};
use weekforge_core::section::{SectionDraft, SectionSpec};

pub const WRITER_SYSTEM: &str = "\
You are a senior educator writing one section of a Master's-level weekly course page.

Follow the weekly template exactly:
- Discovery phase (85 minutes): topics with narrative explanations, readings, and embedded activities
- Engagement phase (85 minutes): an activity with title, type, aligned WLO, instructions, and a grading rubric
- Consolidation phase (42 minutes): a knowledge check of at most 10 questions, a reflection poll, and a summary

Formatting rules:
- Learning objectives use the form \"WLO1: objective (CLO1, CLO2)\", at most three per week
- Readings use 🔍 Focus Area, 💡 Rationale, ⏳ Estimated Time
- Every figure and table has a numbered caption, a source, and alt text
- Videos list title, URL, duration, rationale, and note captions
- Citations are APA style with URLs and dates; prefer sources no older than two years for current topics

Write for smart students who are new to the material: concrete examples, clear steps, no filler.
Output only the Markdown for the requested section.";

pub const COMPLIANCE_SYSTEM: &str = "\
You review course content for template compliance and academic quality.

Check the draft against the weekly template: phase structure and time allocations, WLO format and \
alignment, grading rubrics for graded work, knowledge check limits, heading hierarchy, citation \
completeness, and multimedia annotations (captions, sources, alt text, video metadata).

Mark the draft as not approved if any requirement is missing or wrong. Where a problem can be \
fixed mechanically, add a direct edit instead of asking for a rewrite.

Respond with a single JSON object:
{
  \"approved\": true|false,
  \"quality_score\": 1-10,
  \"scores\": {\"template_compliance\": 1-10, \"objective_alignment\": 1-10, \"multimedia\": 1-10, \"academic_quality\": 1-10},
  \"required_fixes\": [\"specific violation that must be corrected\"],
  \"optional_suggestions\": [\"improvement that is not a violation\"],
  \"direct_edits\": [
    {\"type\": \"trim_to_word_count|citation_fix|header_fix|formatting_fix|insert_missing_subsection\",
     \"location\": \"heading the edit applies to\", \"old_text\": \"...\", \"new_text\": \"...\",
     \"target_words\": 0, \"rationale\": \"...\"}
  ]
}";

pub const LEARNER_SYSTEM: &str = "\
You read course content as a motivated Master's student meeting the material for the first time.

Judge clarity, whether instructions are actionable, whether examples help, whether references are \
complete, and whether the content is engaging. Use the link and dataset reports: broken links and \
inaccessible datasets are problems students will hit.

Respond with a single JSON object:
{
  \"approved\": true|false,
  \"quality_score\": 1-10,
  \"scores\": {\"clarity\": 1-10, \"usability\": 1-10, \"engagement\": 1-10, \"references\": 1-10},
  \"required_fixes\": [\"issue that hurts learning\"],
  \"optional_suggestions\": [\"idea for improvement\"]
}";

pub const COHERENCE_SYSTEM: &str = "\
You direct a Master's program and review a complete week of course content as one learning \
experience: logical flow between sections, coverage of every weekly learning objective, \
connections between sections, academic rigor, and the student experience.

Respond with a single JSON object:
{
  \"approved\": true|false,
  \"quality_score\": 1-10,
  \"required_fixes\": [\"issue that spans sections\"],
  \"optional_suggestions\": [\"improvement for the next iteration\"]
}";

pub const REVISER_SYSTEM: &str = "\
You revise sections of a weekly course page so the week reads as one coherent whole. Change only \
the sections that need it and keep everything else intact.

Respond with a single JSON object mapping section id to the full revised Markdown:
{\"sections\": {\"<section id>\": \"<revised markdown>\"}}";

/// The priority-1 instruction for a writer call.
pub fn writer_task(request: &WriteRequest, total_sections: Option<usize>) -> String {
    let section = &request.section;
    let mut out = format!("**Write the \"{}\" section for Week {}.**\n\n", section.title, request.week_number);

    let _ = writeln!(out, "- ID: {}", section.id);
    match total_sections {
        Some(total) => {
            let _ = writeln!(out, "- Position: {} of {total}", section.ordinal);
        }
        None => {
            let _ = writeln!(out, "- Position: {}", section.ordinal);
        }
    }
    if !section.description.is_empty() {
        let _ = writeln!(out, "- Description: {}", section.description);
    }
    push_constraints(&mut out, section);

    if let Some(guidance) = &request.guidance {
        out.push('\n');
        out.push_str(&render_guidance(guidance));
    }

    if let Some(previous) = &request.previous_draft {
        let _ = write!(
            out,
            "\n**Current draft (revision {}), revise it rather than starting over:**\n\n{}\n",
            request.revision, previous.content_md
        );
    }
    out
}

fn push_constraints(out: &mut String, section: &SectionSpec) {
    let constraints = &section.constraints;
    if !constraints.required_subsections.is_empty() {
        let _ = writeln!(
            out,
            "- Required subsections: {}",
            constraints.required_subsections.join(", ")
        );
    }
    if let Some(style) = &constraints.citation_style {
        let _ = writeln!(out, "- Citation style: {style}");
    }
    if let Some(words) = constraints.max_words {
        let _ = writeln!(out, "- Maximum length: {words} words");
    }
    if let Some(minutes) = constraints.time_estimate_minutes {
        let _ = writeln!(out, "- Time allocation: {minutes} minutes");
    }
    for (key, value) in &constraints.extra {
        let _ = writeln!(out, "- {key}: {value}");
    }
}

/// Revision guidance as the writer sees it.
pub fn render_guidance(guidance: &RevisionGuidance) -> String {
    let mut out = format!(
        "**Revision {} ({} remaining)**\n",
        guidance.revision, guidance.remaining_revisions
    );
    if guidance.rolled_back {
        out.push_str("The last rewrite scored lower than an earlier draft. The draft below is that earlier, better version.\n");
    }
    if !guidance.focus_areas.is_empty() {
        let areas: Vec<&str> = guidance.focus_areas.iter().map(|c| c.as_str()).collect();
        let _ = writeln!(out, "Focus on: {}", areas.join(", "));
    }
    if !guidance.top_issues.is_empty() {
        out.push_str("\nPriority issues:\n");
        for (i, item) in guidance.top_issues.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. [{}] {} (fix: {})",
                i + 1,
                item.priority,
                item.issue,
                item.suggested_fix
            );
        }
    }
    push_list(&mut out, "Compliance reviewer requires", &guidance.compliance_fixes);
    push_list(&mut out, "Learner reviewer requires", &guidance.learner_fixes);

    if !guidance.preserve.is_empty() {
        let kept: Vec<String> = guidance
            .preserve
            .iter()
            .map(|(name, score)| format!("{name} ({score:.1})"))
            .collect();
        let _ = writeln!(out, "\nKeep what works: {}", kept.join(", "));
    }
    if !guidance.must_fix.is_empty() {
        let weak: Vec<String> = guidance
            .must_fix
            .iter()
            .map(|(name, score)| format!("{name} ({score:.1})"))
            .collect();
        let _ = writeln!(out, "Must improve: {}", weak.join(", "));
    }
    if !guidance.memory.is_empty() {
        out.push_str("\nRecurring feedback this week:\n");
        for entry in &guidance.memory {
            let _ = writeln!(out, "- {entry}");
        }
    }
    out
}

fn push_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{title}:");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

/// The compliance reviewer's instruction; the draft goes in its own component.
pub fn compliance_task(spec: &SectionSpec, rules: &ReviewRules) -> String {
    let mut out = format!(
        "**Review the \"{}\" section ({}).**\n",
        spec.title, spec.id
    );
    if !spec.description.is_empty() {
        let _ = writeln!(out, "Expected coverage: {}", spec.description);
    }
    push_constraints(&mut out, spec);
    if !rules.template_rules.trim().is_empty() {
        let _ = write!(out, "\n**Template rules:**\n{}\n", rules.template_rules.trim());
    }
    if !rules.multimedia_rules.trim().is_empty() {
        let _ = write!(out, "\n**Multimedia rules:**\n{}\n", rules.multimedia_rules.trim());
    }
    out
}

pub fn learner_task(draft: &SectionDraft, links: &LinkCheckReport, datasets: &DatasetReport) -> String {
    let mut out = format!("**Review section {} as a student.**\n", draft.section_id);

    if links.results.is_empty() {
        out.push_str("\nNo links were checked.\n");
    } else {
        let _ = writeln!(
            out,
            "\n**Link check:** {} working, {} broken",
            links.working().count(),
            links.broken().count()
        );
        for broken in links.broken() {
            let reason = broken
                .error
                .clone()
                .or_else(|| broken.status.map(|s| format!("HTTP {s}")))
                .unwrap_or_else(|| "failed".into());
            let _ = writeln!(out, "- BROKEN {} ({reason})", broken.url);
        }
    }

    if !datasets.datasets.is_empty() {
        let _ = writeln!(out, "\n**Datasets:** {} referenced", datasets.datasets.len());
        for dataset in datasets.inaccessible() {
            let _ = writeln!(out, "- INACCESSIBLE {} ({})", dataset.url, dataset.source);
        }
    }
    out
}

pub fn coherence_task(week_number: u32, objectives: &str) -> String {
    let mut out = format!("**Final coherence review for Week {week_number}.**\n");
    if !objectives.trim().is_empty() {
        let _ = write!(out, "\n**Weekly learning objectives:**\n{}\n", objectives.trim());
    }
    out
}

pub fn reviser_task(sections: &[PriorSection], notes: &ReviewNotes) -> String {
    let mut out = String::from("**Revise the week to address the coherence review.**\n");
    push_list(&mut out, "Required fixes", &notes.required_fixes);
    push_list(&mut out, "Suggestions", &notes.optional_suggestions);
    let ids: Vec<&str> = sections.iter().map(|s| s.id.as_str()).collect();
    let _ = writeln!(out, "\nSection ids: {}", ids.join(", "));
    out
}

/// Sections rendered for the reviser, each under its id.
pub fn render_sections(sections: &[PriorSection]) -> String {
    sections
        .iter()
        .map(|s| format!("<<section {}>>\n{}", s.id, s.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use weekforge_core::feedback::{
        FeedbackCategory, FeedbackPriority, PrioritizedFeedback, Reviewer,
    };
    use weekforge_core::run::FeedbackMemoryEntry;
    use weekforge_core::section::SectionConstraints;

    fn request() -> WriteRequest {
        WriteRequest {
            week_number: 4,
            section: SectionSpec::new("03-keywords", "Key Words")
                .with_ordinal(3)
                .with_description("Core vocabulary with citations")
                .with_constraints(SectionConstraints {
                    max_words: Some(600),
                    ..SectionConstraints::default()
                }),
            revision: 0,
            previous_draft: None,
            guidance: None,
            prior_sections: Vec::new(),
        }
    }

    #[test]
    fn first_write_has_no_draft_or_guidance() {
        let task = writer_task(&request(), Some(8));
        assert!(task.contains("\"Key Words\" section for Week 4"));
        assert!(task.contains("Position: 3 of 8"));
        assert!(task.contains("Maximum length: 600 words"));
        assert!(!task.contains("Current draft"));
        assert!(!task.contains("Revision"));
    }

    #[test]
    fn revision_includes_guidance_and_previous_draft() {
        let mut req = request();
        req.revision = 2;
        req.previous_draft = Some(SectionDraft::raw("03-keywords", "## Key Words\nold text"));
        req.guidance = Some(RevisionGuidance {
            revision: 2,
            remaining_revisions: 3,
            focus_areas: vec![FeedbackCategory::Citations],
            top_issues: vec![PrioritizedFeedback {
                issue: "Missing citation for definition 2".into(),
                priority: FeedbackPriority::Critical,
                category: FeedbackCategory::Citations,
                reviewer: Reviewer::Compliance,
                suggested_fix: "Add a complete reference".into(),
            }],
            memory: vec![FeedbackMemoryEntry {
                source: Reviewer::Learner,
                section_title: "Overview".into(),
                issue: "Too much jargon".into(),
            }],
            ..RevisionGuidance::default()
        });

        let task = writer_task(&req, None);
        assert!(task.contains("Revision 2 (3 remaining)"));
        assert!(task.contains("Focus on: citations"));
        assert!(task.contains("1. [critical] Missing citation for definition 2"));
        assert!(task.contains("[learner] Overview: Too much jargon"));
        assert!(task.contains("old text"));
    }

    #[test]
    fn rolled_back_guidance_says_so() {
        let guidance = RevisionGuidance {
            rolled_back: true,
            ..RevisionGuidance::default()
        };
        assert!(render_guidance(&guidance).contains("earlier, better version"));
    }

    #[test]
    fn learner_task_lists_broken_links() {
        let links = LinkCheckReport {
            results: vec![weekforge_core::review::LinkCheckResult {
                url: "https://dead.example".into(),
                ok: false,
                status: Some(404),
                error: None,
                rounds_passed: 0,
                rounds: 3,
            }],
        };
        let task = learner_task(
            &SectionDraft::raw("01-overview", "text"),
            &links,
            &DatasetReport::default(),
        );
        assert!(task.contains("0 working, 1 broken"));
        assert!(task.contains("BROKEN https://dead.example (HTTP 404)"));
    }
}
