//! File-based store: section drafts and compiled weeks as Markdown.
//!
//! Layout under the output directory:
//!
//! ```text
//! sections/week{N}/{section_id}.md     accepted drafts with front matter
//! sections/week{N}/{section_id}.md.bak previous version, if any
//! weekly/Week{N}.md                    compiled document
//! ```
//!
//! Front matter is a small `---` delimited block (section id, word count,
//! status, timestamp) that is stripped again on load.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use weekforge_core::collaborator::PersistenceStore;
use weekforge_core::error::StoreError;
use weekforge_core::run::PriorSection;
use weekforge_core::section::SectionDraft;

/// A filesystem-backed persistence store.
pub struct FileStore {
    sections_dir: PathBuf,
    weekly_dir: PathBuf,
}

impl FileStore {
    pub fn new(sections_dir: impl Into<PathBuf>, weekly_dir: impl Into<PathBuf>) -> Self {
        Self {
            sections_dir: sections_dir.into(),
            weekly_dir: weekly_dir.into(),
        }
    }

    /// Store rooted at `output_dir` with the default layout.
    pub fn under(output_dir: &Path) -> Self {
        Self::new(output_dir.join("sections"), output_dir.join("weekly"))
    }

    fn week_dir(&self, week_number: u32) -> PathBuf {
        self.sections_dir.join(format!("week{week_number}"))
    }

    pub fn week_path(&self, week_number: u32) -> PathBuf {
        self.weekly_dir.join(format!("Week{week_number}.md"))
    }
}

fn io_error(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

fn render_front_matter(draft: &SectionDraft) -> String {
    format!(
        "---\nsection_id: {}\nword_count: {}\nstatus: approved\nsaved_at: {}\n---\n\n",
        draft.section_id,
        draft.word_count,
        Utc::now().to_rfc3339()
    )
}

/// Split off a leading `---` block, returning the body.
fn strip_front_matter(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("---") else {
        return content;
    };
    match rest.find("\n---") {
        Some(end) => rest[end + 4..].trim_start_matches(['\r', '\n']),
        None => content,
    }
}

fn first_heading(content: &str) -> Option<String> {
    content
        .lines()
        .find(|l| l.starts_with("# ") || l.starts_with("## "))
        .map(|l| l.trim_start_matches('#').trim().to_string())
}

async fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| io_error(dir, e))
}

#[async_trait]
impl PersistenceStore for FileStore {
    async fn save_draft(
        &self,
        week_number: u32,
        draft: &SectionDraft,
    ) -> Result<String, StoreError> {
        let dir = self.week_dir(week_number);
        ensure_dir(&dir).await?;

        let path = dir.join(format!("{}.md", draft.section_id));
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let backup = path.with_extension("md.bak");
            if let Err(e) = tokio::fs::rename(&path, &backup).await {
                warn!(path = %path.display(), error = %e, "Could not back up previous draft");
            }
        }

        let content = format!("{}{}", render_front_matter(draft), draft.content_md);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_error(&path, e))?;

        debug!(section = %draft.section_id, path = %path.display(), "Draft saved");
        Ok(path.display().to_string())
    }

    async fn load_prior_sections(
        &self,
        week_number: u32,
    ) -> Result<Vec<PriorSection>, StoreError> {
        let dir = self.week_dir(week_number);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir, e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&dir, e))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("md") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut sections = Vec::with_capacity(paths.len());
        for path in paths {
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| io_error(&path, e))?;
            let content = strip_front_matter(&raw).trim().to_string();
            let title = first_heading(&content).unwrap_or_else(|| id.clone());
            sections.push(PriorSection { id, title, content });
        }

        Ok(sections)
    }

    async fn save_week(&self, week_number: u32, document: &str) -> Result<String, StoreError> {
        ensure_dir(&self.weekly_dir).await?;
        let path = self.week_path(week_number);
        tokio::fs::write(&path, document)
            .await
            .map_err(|e| io_error(&path, e))?;
        debug!(week = week_number, path = %path.display(), "Week document saved");
        Ok(path.display().to_string())
    }
}
