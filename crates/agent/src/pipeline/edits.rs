//! Mechanical direct edits applied to a draft without a writer call.
//!
//! Each edit kind has its own way of finding where to act. An edit that
//! cannot be located is skipped and reported, never forced.

use crate::pipeline::markdown;
use serde::Serialize;
use weekforge_core::review::{DirectEdit, DirectEditKind};
use weekforge_core::section::SectionDraft;

/// What happened to one edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    pub kind: DirectEditKind,
    pub location: String,
    pub applied: bool,
    pub detail: String,
}

impl EditOutcome {
    fn applied(edit: &DirectEdit, detail: impl Into<String>) -> Self {
        Self {
            kind: edit.kind,
            location: edit.location.clone(),
            applied: true,
            detail: detail.into(),
        }
    }

    fn skipped(edit: &DirectEdit, detail: impl Into<String>) -> Self {
        Self {
            kind: edit.kind,
            location: edit.location.clone(),
            applied: false,
            detail: detail.into(),
        }
    }
}

/// Apply `edits` in order and refresh the draft's derived fields.
pub fn apply_edits(draft: &mut SectionDraft, edits: &[DirectEdit]) -> Vec<EditOutcome> {
    let mut outcomes = Vec::with_capacity(edits.len());
    for edit in edits {
        let (content, outcome) = apply_edit(&draft.content_md, edit);
        if let Some(content) = content {
            draft.content_md = content;
        }
        outcomes.push(outcome);
    }
    if outcomes.iter().any(|o| o.applied) {
        markdown::refresh(draft);
    }
    outcomes
}

/// Apply one edit; returns the new content when it changed.
pub fn apply_edit(content: &str, edit: &DirectEdit) -> (Option<String>, EditOutcome) {
    match edit.kind {
        DirectEditKind::TrimToWordCount => trim_to_word_count(content, edit),
        DirectEditKind::CitationFix => replace_text(content, edit, false),
        DirectEditKind::FormattingFix => replace_text(content, edit, true),
        DirectEditKind::HeaderFix => fix_header(content, edit),
        DirectEditKind::InsertMissingSubsection => insert_subsection(content, edit),
    }
}

fn trim_to_word_count(content: &str, edit: &DirectEdit) -> (Option<String>, EditOutcome) {
    let Some(target) = edit.target_words.filter(|n| *n > 0) else {
        return (None, EditOutcome::skipped(edit, "no target word count"));
    };
    let Some(span) = find_section(content, &edit.location) else {
        return (None, EditOutcome::skipped(edit, "subsection not found"));
    };

    let body = &content[span.body_start..span.body_end];
    let Some(cut) = cut_after_words(body, target) else {
        return (None, EditOutcome::skipped(edit, "already within word count"));
    };

    let mut out = String::with_capacity(content.len());
    out.push_str(&content[..span.body_start]);
    out.push_str(body[..cut].trim_end());
    out.push_str(&format!("\n\n*[Trimmed to {target} words for length.]*\n"));
    if span.body_end < content.len() {
        out.push('\n');
        out.push_str(&content[span.body_end..]);
    }
    (Some(out), EditOutcome::applied(edit, format!("trimmed to {target} words")))
}

fn replace_text(content: &str, edit: &DirectEdit, all: bool) -> (Option<String>, EditOutcome) {
    let (Some(old), Some(new)) = (edit.old_text.as_deref(), edit.new_text.as_deref()) else {
        return (None, EditOutcome::skipped(edit, "old and new text required"));
    };
    if old.is_empty() || !content.contains(old) {
        return (None, EditOutcome::skipped(edit, "text not found"));
    }

    let (out, count) = if all {
        (content.replace(old, new), content.matches(old).count())
    } else {
        (content.replacen(old, new, 1), 1)
    };
    (Some(out), EditOutcome::applied(edit, format!("{count} replacement(s)")))
}

fn fix_header(content: &str, edit: &DirectEdit) -> (Option<String>, EditOutcome) {
    let Some(new) = edit.new_text.as_deref().filter(|n| !n.trim().is_empty()) else {
        return (None, EditOutcome::skipped(edit, "no replacement heading"));
    };

    if let Some(old) = edit.old_text.as_deref().filter(|o| content.contains(*o)) {
        return (
            Some(content.replacen(old, new, 1)),
            EditOutcome::applied(edit, "heading text replaced"),
        );
    }

    let Some(span) = find_section(content, &edit.location) else {
        return (None, EditOutcome::skipped(edit, "heading not found"));
    };
    let heading_line = content[span.heading_start..span.body_start].trim_end();
    let replacement = if new.trim_start().starts_with('#') {
        new.trim().to_string()
    } else {
        let hashes: String = heading_line.chars().take_while(|c| *c == '#').collect();
        format!("{hashes} {}", new.trim())
    };

    let mut out = String::with_capacity(content.len());
    out.push_str(&content[..span.heading_start]);
    out.push_str(&replacement);
    out.push_str(&content[span.heading_start + heading_line.len()..]);
    (Some(out), EditOutcome::applied(edit, "heading line replaced"))
}

fn insert_subsection(content: &str, edit: &DirectEdit) -> (Option<String>, EditOutcome) {
    let Some(new) = edit.new_text.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
        return (None, EditOutcome::skipped(edit, "no subsection text"));
    };
    let first_line = new.lines().next().unwrap_or(new).trim();
    if content.lines().any(|l| l.trim() == first_line) {
        return (None, EditOutcome::skipped(edit, "subsection already present"));
    }

    match find_section(content, &edit.location) {
        Some(span) => {
            let before = content[..span.body_end].trim_end();
            let after = &content[span.body_end..];
            let mut out = format!("{before}\n\n{new}\n");
            if !after.is_empty() {
                out.push('\n');
                out.push_str(after);
            }
            (Some(out), EditOutcome::applied(edit, "inserted after anchor"))
        }
        None => {
            let out = format!("{}\n\n{new}\n", content.trim_end());
            (Some(out), EditOutcome::applied(edit, "appended"))
        }
    }
}

// ── Locating ──────────────────────────────────────────────────────────────

/// Byte offsets of a heading line and the body that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SectionSpan {
    heading_start: usize,
    body_start: usize,
    /// Start of the next heading, or end of content
    body_end: usize,
}

/// Find the first heading whose text contains `location` (case-insensitive).
fn find_section(content: &str, location: &str) -> Option<SectionSpan> {
    let needle = location.trim().trim_start_matches('#').trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let mut offset = 0;
    let mut found: Option<(usize, usize)> = None;
    for line in content.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        if !line.starts_with('#') {
            continue;
        }
        match found {
            None => {
                let text = line.trim_start_matches('#').trim().to_lowercase();
                if text.contains(&needle) {
                    found = Some((start, offset));
                }
            }
            Some((heading_start, body_start)) => {
                return Some(SectionSpan {
                    heading_start,
                    body_start,
                    body_end: start,
                });
            }
        }
    }

    found.map(|(heading_start, body_start)| SectionSpan {
        heading_start,
        body_start,
        body_end: content.len(),
    })
}

/// Byte offset just past the `n`th word, if the text has more than `n` words.
fn cut_after_words(text: &str, n: usize) -> Option<usize> {
    let mut count = 0;
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word {
                in_word = false;
                count += 1;
                if count == n {
                    let rest = &text[i..];
                    return rest.split_whitespace().next().map(|_| i);
                }
            }
        } else {
            in_word = true;
        }
    }
    None
}
