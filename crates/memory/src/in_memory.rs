//! In-memory store, useful for testing and dry runs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use weekforge_core::collaborator::PersistenceStore;
use weekforge_core::error::StoreError;
use weekforge_core::run::PriorSection;
use weekforge_core::section::SectionDraft;

/// Keeps drafts and compiled weeks in maps keyed by week number.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    drafts: Arc<RwLock<BTreeMap<u32, BTreeMap<String, SectionDraft>>>>,
    weeks: Arc<RwLock<BTreeMap<u32, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a week with sections accepted in an earlier run.
    pub async fn seed(&self, week_number: u32, draft: SectionDraft) {
        self.drafts
            .write()
            .await
            .entry(week_number)
            .or_default()
            .insert(draft.section_id.clone(), draft);
    }

    pub async fn week_document(&self, week_number: u32) -> Option<String> {
        self.weeks.read().await.get(&week_number).cloned()
    }

    pub async fn draft(&self, week_number: u32, section_id: &str) -> Option<SectionDraft> {
        self.drafts
            .read()
            .await
            .get(&week_number)
            .and_then(|w| w.get(section_id))
            .cloned()
    }
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn save_draft(
        &self,
        week_number: u32,
        draft: &SectionDraft,
    ) -> Result<String, StoreError> {
        self.seed(week_number, draft.clone()).await;
        Ok(format!("memory://week{week_number}/{}", draft.section_id))
    }

    async fn load_prior_sections(
        &self,
        week_number: u32,
    ) -> Result<Vec<PriorSection>, StoreError> {
        let drafts = self.drafts.read().await;
        Ok(drafts
            .get(&week_number)
            .map(|week| {
                week.values()
                    .map(|d| PriorSection {
                        id: d.section_id.clone(),
                        title: d
                            .content_md
                            .lines()
                            .find(|l| l.starts_with('#'))
                            .map(|l| l.trim_start_matches('#').trim().to_string())
                            .unwrap_or_else(|| d.section_id.clone()),
                        content: d.content_md.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn save_week(&self, week_number: u32, document: &str) -> Result<String, StoreError> {
        self.weeks
            .write()
            .await
            .insert(week_number, document.to_string());
        Ok(format!("memory://Week{week_number}.md"))
    }
}
