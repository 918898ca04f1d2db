//! Dataset reference extraction and accessibility checks.
//!
//! Kaggle datasets are extracted first and normalized to their canonical
//! URL; UCI, GitHub, Hugging Face, and data.gov references follow. Dataset
//! hosts routinely block bots, so 403 counts as accessible.

use crate::probe::UrlProbe;
use async_trait::async_trait;
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::info;
use weekforge_core::collaborator::DatasetVerifier;
use weekforge_core::review::{DatasetCheck, DatasetReport};

static KAGGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)kaggle\.com/datasets/([^/\s)\]]+)/([^/\s)\]]+)").expect("valid kaggle pattern")
});

static OTHER_SOURCES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("uci", r"archive\.ics\.uci\.edu/(?:ml/)?datasets/([^/\s)\]]+)"),
        ("github", r"github\.com/([^/\s)\]]+)/([^/\s)\]]+)"),
        ("huggingface", r"huggingface\.co/datasets/([^\s)\]]+)"),
        ("data.gov", r"data\.gov/dataset/([^/\s)\]]+)"),
    ]
    .into_iter()
    .map(|(source, pattern)| {
        let full = format!(r"(?i)(?:https?://)?(?:[a-z0-9-]+\.)*{pattern}");
        (source, Regex::new(&full).expect("valid dataset pattern"))
    })
    .collect()
});

/// A dataset reference found in Markdown, before probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRef {
    pub url: String,
    pub source: &'static str,
    pub identifier: String,
}

fn clean(segment: &str) -> &str {
    segment.trim_end_matches(['.', ',', ';', ':', '!', '?'])
}

/// Extract dataset references in priority order, deduplicated by URL.
pub fn extract_datasets(markdown: &str) -> Vec<DatasetRef> {
    let mut found = Vec::new();

    for caps in KAGGLE.captures_iter(markdown) {
        let (Some(owner), Some(name)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let identifier = format!("{}/{}", clean(owner.as_str()), clean(name.as_str()));
        found.push(DatasetRef {
            url: format!("https://www.kaggle.com/datasets/{identifier}"),
            source: "kaggle",
            identifier,
        });
    }

    for (source, pattern) in OTHER_SOURCES.iter() {
        for caps in pattern.captures_iter(markdown) {
            let (Some(whole), Some(first)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let matched = clean(whole.as_str());
            let url = if matched.starts_with("http") {
                matched.to_string()
            } else {
                format!("https://{matched}")
            };
            found.push(DatasetRef {
                url,
                source,
                identifier: clean(first.as_str()).to_string(),
            });
        }
    }

    let mut seen = HashSet::new();
    found.retain(|d| seen.insert(d.url.clone()));
    found
}

pub struct DatasetChecker {
    probe: Arc<dyn UrlProbe>,
}

impl DatasetChecker {
    pub fn new(probe: Arc<dyn UrlProbe>) -> Self {
        Self { probe }
    }

    async fn check(&self, dataset: DatasetRef) -> DatasetCheck {
        let outcome = self.probe.probe(&dataset.url).await;
        let accessible = outcome.is_success() || outcome.is_forbidden();
        DatasetCheck {
            url: dataset.url,
            source: dataset.source.to_string(),
            identifier: Some(dataset.identifier),
            exists: accessible,
            accessible,
            status: outcome.status,
            error: outcome.error,
        }
    }
}

#[async_trait]
impl DatasetVerifier for DatasetChecker {
    async fn verify_all(&self, markdown: &str) -> DatasetReport {
        let refs = extract_datasets(markdown);
        let kaggle = refs.iter().filter(|d| d.source == "kaggle").count();

        let mut datasets = Vec::with_capacity(refs.len());
        for dataset in refs {
            datasets.push(self.check(dataset).await);
        }

        let report = DatasetReport { datasets };
        info!(
            total = report.datasets.len(),
            kaggle,
            inaccessible = report.inaccessible().count(),
            "Dataset verification complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use crate::probe::testing::ScriptedProbe;

    #[test]
    fn kaggle_extracted_first_and_normalized() {
        let md = "Use [Titanic](https://github.com/datasciencedojo/datasets) or \
                  [the Kaggle version](https://kaggle.com/datasets/heptapod/titanic).";
        let refs = extract_datasets(md);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].source, "kaggle");
        assert_eq!(refs[0].url, "https://www.kaggle.com/datasets/heptapod/titanic");
        assert_eq!(refs[0].identifier, "heptapod/titanic");
        assert_eq!(refs[1].source, "github");
        assert_eq!(refs[1].url, "https://github.com/datasciencedojo/datasets");
    }

    #[test]
    fn duplicates_removed() {
        let md = "See https://www.kaggle.com/datasets/a/b and again https://kaggle.com/datasets/a/b.";
        let refs = extract_datasets(md);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].identifier, "a/b");
    }

    #[test]
    fn other_hosts_recognized() {
        let md = "- https://archive.ics.uci.edu/ml/datasets/iris\n\
                  - https://huggingface.co/datasets/imdb\n\
                  - https://catalog.data.gov/dataset/crime-data";
        let refs = extract_datasets(md);
        let sources: Vec<_> = refs.iter().map(|d| d.source).collect();
        assert_eq!(sources, vec!["uci", "huggingface", "data.gov"]);
        assert_eq!(refs[2].url, "https://catalog.data.gov/dataset/crime-data");
    }

    #[test]
    fn plain_prose_has_no_datasets() {
        assert!(extract_datasets("No data here, just https://example.com/page.").is_empty());
    }

    #[tokio::test]
    async fn forbidden_counts_as_accessible() {
        let probe = ScriptedProbe::new()
            .with(
                "https://www.kaggle.com/datasets/heptapod/titanic",
                vec![ProbeOutcome::status(403)],
            )
            .with(
                "https://huggingface.co/datasets/gone",
                vec![ProbeOutcome::status(404)],
            );
        let checker = DatasetChecker::new(Arc::new(probe));
        let report = checker
            .verify_all("kaggle.com/datasets/heptapod/titanic and huggingface.co/datasets/gone")
            .await;

        assert_eq!(report.datasets.len(), 2);
        assert!(report.datasets[0].accessible);
        assert_eq!(report.datasets[0].status, Some(403));
        assert!(!report.datasets[1].accessible);
        assert_eq!(report.inaccessible().count(), 1);
    }
}
