//! Extractors that turn raw inputs into prompt components.
//!
//! Each extractor keeps only the parts of its source that matter to a
//! writer call and caps its own size; the budget manager then decides what
//! survives when everything together is still too large.

use crate::context::budget::{ContextBudgetManager, ContextComponent};
use weekforge_core::run::{PriorSection, SearchResult};

const PREVIOUS_SECTIONS_MAX_TOKENS: usize = 800;
const PREVIOUS_SECTION_MAX_CHARS: usize = 200;
const WEB_RESULTS_MAX: usize = 5;
const WEB_SNIPPET_MAX_CHARS: usize = 150;
const GUIDELINES_MAX_TOKENS: usize = 2_000;
const GUIDELINES_LINES_PER_SECTION: usize = 10;
const SYLLABUS_MAX_TOKENS: usize = 600;
const TEMPLATE_MAX_TOKENS: usize = 400;

/// Guideline headings worth carrying into every prompt.
const GUIDELINE_KEYWORDS: [&str; 10] = [
    "template",
    "building blocks",
    "multimedia",
    "assessment",
    "citation",
    "objective",
    "accessibility",
    "narrative",
    "word count",
    "structure",
];

const SYLLABUS_KEYWORDS: [&str; 5] = ["wlo", "learning objective", "objective", "outcome", "clo"];

const TEMPLATE_PHASES: [&str; 3] = ["discovery", "engagement", "consolidation"];
const TEMPLATE_KEYWORDS: [&str; 5] = ["minutes", "wlo", "required", "format", "structure"];

/// Raw material for one writer prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptSources<'a> {
    pub task: &'a str,
    pub prior_sections: &'a [PriorSection],
    pub web_results: &'a [SearchResult],
    pub guidelines: &'a str,
    pub syllabus: &'a str,
    pub template: &'a str,
}

/// The standard priority-ordered components for a writer call.
///
/// The task is always present; the others only when their source is non-empty.
pub fn standard_components(
    budget: &ContextBudgetManager,
    sources: &PromptSources<'_>,
) -> Vec<ContextComponent> {
    let mut components = vec![ContextComponent::new("task", sources.task, 1)];

    components.push(
        ContextComponent::new(
            "previous_sections",
            summarize_previous_sections(budget, sources.prior_sections),
            2,
        )
        .with_floor(200),
    );

    if !sources.web_results.is_empty() {
        components.push(
            ContextComponent::new("web_results", format_web_results(sources.web_results), 3)
                .with_floor(300),
        );
    }

    if !sources.guidelines.trim().is_empty() {
        components.push(
            ContextComponent::new("guidelines", extract_key_guidelines(budget, sources.guidelines), 4)
                .with_heading("**Key Guidelines:**")
                .with_floor(400),
        );
    }

    if !sources.syllabus.trim().is_empty() {
        components.push(
            ContextComponent::new("syllabus", extract_relevant_syllabus(budget, sources.syllabus), 5)
                .with_heading("**Syllabus Context:**")
                .with_floor(200),
        );
    }

    if !sources.template.trim().is_empty() {
        components.push(
            ContextComponent::new("template", extract_template_essentials(budget, sources.template), 6)
                .with_heading("**Template Requirements:**")
                .with_floor(150),
        );
    }

    components
}

/// First two body lines of each accepted section, stopping at the token cap.
pub fn summarize_previous_sections(
    budget: &ContextBudgetManager,
    sections: &[PriorSection],
) -> String {
    if sections.is_empty() {
        return "This is the first section of the week.".to_string();
    }

    let mut summaries = Vec::new();
    let mut used = 0;
    for section in sections {
        let lines: Vec<&str> = section
            .content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .take(2)
            .collect();
        if lines.is_empty() {
            continue;
        }

        let joined = lines.join(" ");
        let summary = format!(
            "**{}**: {}...",
            section.title,
            take_chars(&joined, PREVIOUS_SECTION_MAX_CHARS)
        );
        let tokens = budget.count(&summary);
        if used + tokens > PREVIOUS_SECTIONS_MAX_TOKENS {
            break;
        }
        used += tokens;
        summaries.push(summary);
    }

    if summaries.is_empty() {
        "Previous sections have been covered (content summarized due to length).".to_string()
    } else {
        format!("**Previously covered:**\n{}", summaries.join("\n"))
    }
}

pub fn format_web_results(results: &[SearchResult]) -> String {
    let mut out = vec!["**Fresh Web Sources:**".to_string()];
    for result in results.iter().take(WEB_RESULTS_MAX) {
        let title = if result.title.is_empty() {
            "Untitled"
        } else {
            &result.title
        };
        let mut entry = format!(
            "- [{}]({})\n  {}...",
            title,
            result.url,
            take_chars(&result.snippet, WEB_SNIPPET_MAX_CHARS)
        );
        if let Some(published) = result.published_date.as_deref().filter(|p| !p.is_empty()) {
            entry.push_str(&format!("\n  Published: {published}"));
        }
        out.push(entry);
    }
    out.join("\n")
}

/// Keep guideline sections whose heading names a priority topic.
pub fn extract_key_guidelines(budget: &ContextBudgetManager, guidelines: &str) -> String {
    let mut extracted: Vec<&str> = Vec::new();
    let mut heading: Option<&str> = None;
    let mut body: Vec<&str> = Vec::new();

    for line in guidelines.lines() {
        if line.starts_with('#') {
            flush_guideline(heading, &mut body, &mut extracted);
            let lower = line.to_lowercase();
            heading = GUIDELINE_KEYWORDS
                .iter()
                .any(|k| lower.contains(k))
                .then_some(line);
        } else if heading.is_some() && !line.trim().is_empty() {
            body.push(line);
        }
    }
    flush_guideline(heading, &mut body, &mut extracted);

    let text = extracted.join("\n");
    budget.truncate_text(&text, GUIDELINES_MAX_TOKENS)
}

fn flush_guideline<'a>(heading: Option<&'a str>, body: &mut Vec<&'a str>, out: &mut Vec<&'a str>) {
    if let Some(h) = heading {
        out.push(h);
        out.extend(body.iter().take(GUIDELINES_LINES_PER_SECTION).filter(|l| {
            let t = l.trim();
            !(t.starts_with('>') || t.starts_with("```") || t.starts_with("---"))
        }));
    }
    body.clear();
}

/// Objective and outcome lines, or the opening lines when none are marked.
pub fn extract_relevant_syllabus(budget: &ContextBudgetManager, syllabus: &str) -> String {
    let mut relevant: Vec<&str> = syllabus
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            SYLLABUS_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .collect();

    if relevant.is_empty() {
        relevant = syllabus
            .lines()
            .take(20)
            .filter(|l| !l.trim().is_empty())
            .collect();
    }

    budget.truncate_text(&relevant.join("\n"), SYLLABUS_MAX_TOKENS)
}

/// Structural template lines: phases, timings, and format requirements.
pub fn extract_template_essentials(budget: &ContextBudgetManager, template: &str) -> String {
    let mut essential: Vec<&str> = template
        .lines()
        .filter(|line| {
            let lower = line.trim().to_lowercase();
            !lower.is_empty()
                && (TEMPLATE_PHASES.iter().any(|p| lower.starts_with(p))
                    || TEMPLATE_KEYWORDS.iter().any(|k| lower.contains(k)))
        })
        .collect();

    if essential.is_empty() {
        essential = template
            .lines()
            .filter(|l| !l.trim().is_empty())
            .take(10)
            .collect();
    }

    budget.truncate_text(&essential.join("\n"), TEMPLATE_MAX_TOKENS)
}

/// The `### Week N:` block of a syllabus, up to the next week heading.
pub fn week_block(syllabus: &str, week_number: u32) -> Option<String> {
    let header = format!("### Week {week_number}:");
    let mut block = Vec::new();
    let mut capturing = false;

    for line in syllabus.lines() {
        if line.starts_with(&header) {
            capturing = true;
            block.push(line);
        } else if capturing && line.starts_with("### Week ") {
            break;
        } else if capturing {
            block.push(line);
        }
    }

    (!block.is_empty()).then(|| block.join("\n"))
}

fn take_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
