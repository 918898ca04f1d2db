//! Derived draft fields: links, citations, objective mapping, word count.

use regex_lite::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use weekforge_core::section::SectionDraft;

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]]*\]\(([^)\s]+)\)").expect("valid markdown link pattern")
});

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s)\]>]+|www\.[^\s)\]>]+").expect("valid url pattern")
});

static OBJECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bWLO[- ]?(\d+)").expect("valid objective pattern"));

static NUMBERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.").expect("valid list pattern"));

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Build a draft from raw Markdown with every derived field filled in.
pub fn derive_draft(section_id: &str, content_md: impl Into<String>) -> SectionDraft {
    let mut draft = SectionDraft::raw(section_id, content_md);
    refresh(&mut draft);
    draft
}

/// Recompute derived fields after `content_md` changed.
pub fn refresh(draft: &mut SectionDraft) {
    draft.links = extract_links(&draft.content_md);
    draft.citations = extract_citations(&draft.content_md);
    draft.objective_mapping = objective_mapping(&draft.content_md);
    draft.word_count = word_count(&draft.content_md);
}

/// Outbound URLs from Markdown links and bare URLs, deduplicated in order.
pub fn extract_links(markdown: &str) -> Vec<String> {
    let targets = MARKDOWN_LINK
        .captures_iter(markdown)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|t| t.starts_with("http") || t.starts_with("www."));
    let bare = BARE_URL.find_iter(markdown).map(|m| m.as_str());

    let mut links: Vec<String> = Vec::new();
    for raw in targets.chain(bare) {
        let trimmed = raw.trim_end_matches(TRAILING_PUNCTUATION);
        let url = if trimmed.starts_with("http") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };
        if !links.contains(&url) {
            links.push(url);
        }
    }
    links
}

/// List items that look like references: a URL or a parenthesised source.
pub fn extract_citations(markdown: &str) -> Vec<String> {
    markdown
        .lines()
        .map(str::trim)
        .filter(|line| {
            line.starts_with('*') || line.starts_with('-') || NUMBERED_ITEM.is_match(line)
        })
        .filter(|line| line.contains("http") || (line.contains('(') && line.contains(')')))
        .map(String::from)
        .collect()
}

/// `WLOn` → the lines that mention it.
pub fn objective_mapping(markdown: &str) -> BTreeMap<String, Vec<String>> {
    let mut mapping: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for line in markdown.lines() {
        for caps in OBJECTIVE.captures_iter(line) {
            let Some(number) = caps.get(1) else { continue };
            let lines = mapping.entry(format!("WLO{}", number.as_str())).or_default();
            let line = line.trim().to_string();
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
    }
    mapping
}

pub fn word_count(markdown: &str) -> usize {
    markdown.split_whitespace().count()
}

/// Text of the first `#` or `##` heading.
pub fn first_heading(markdown: &str) -> Option<&str> {
    markdown.lines().find_map(|line| {
        line.strip_prefix("# ")
            .or_else(|| line.strip_prefix("## "))
            .map(str::trim)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
## Overview

This week covers regression (WLO1) and evaluation, see WLO-2.
Read [the guide](https://example.com/guide). Also www.scikit-learn.org/stable.

## References

- James, G. (2021). An Introduction to Statistical Learning. https://www.statlearning.com
- Lecture notes (internal)
- A plain bullet
1. Hastie, T. (2009). Elements of Statistical Learning.
";

    #[test]
    fn links_in_order_without_duplicates() {
        let links = extract_links(SAMPLE);
        assert_eq!(
            links,
            [
                "https://example.com/guide",
                "https://www.scikit-learn.org/stable",
                "https://www.statlearning.com",
            ]
        );
    }

    #[test]
    fn anchor_links_ignored() {
        assert!(extract_links("[Jump](#overview)").is_empty());
    }

    #[test]
    fn citations_need_url_or_parentheses() {
        let citations = extract_citations(SAMPLE);
        assert_eq!(citations.len(), 3);
        assert!(citations[0].starts_with("- James"));
        assert_eq!(citations[1], "- Lecture notes (internal)");
        assert!(citations[2].starts_with("1. Hastie"));
    }

    #[test]
    fn objective_mapping_normalizes_ids() {
        let mapping = objective_mapping(SAMPLE);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["WLO1"].len(), 1);
        assert!(mapping["WLO2"][0].contains("evaluation"));
    }

    #[test]
    fn derive_fills_every_field() {
        let draft = derive_draft("01-overview", SAMPLE);
        assert_eq!(draft.section_id, "01-overview");
        assert_eq!(draft.links.len(), 3);
        assert_eq!(draft.word_count, SAMPLE.split_whitespace().count());
        assert!(draft.needs_revision);
    }

    #[test]
    fn first_heading_found() {
        assert_eq!(first_heading(SAMPLE), Some("Overview"));
        assert_eq!(first_heading("no headings here"), None);
        assert_eq!(first_heading("### Deep\n# Top"), Some("Top"));
    }
}
