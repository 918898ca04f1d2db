//! Link verification across independent rounds.
//!
//! A URL counts as working only when every round succeeds. Scholarly
//! publishers often answer automated requests with 403; for configured
//! paywalled domains that still counts as a pass.

use crate::probe::UrlProbe;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use weekforge_core::collaborator::LinkVerifier;
use weekforge_core::review::{LinkCheckReport, LinkCheckResult};

pub struct LinkChecker {
    probe: Arc<dyn UrlProbe>,
    rounds: u32,
    paywalled_domains: Vec<String>,
}

impl LinkChecker {
    pub fn new(probe: Arc<dyn UrlProbe>) -> Self {
        Self {
            probe,
            rounds: 3,
            paywalled_domains: Vec::new(),
        }
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds.max(1);
        self
    }

    pub fn with_paywalled_domains(mut self, domains: Vec<String>) -> Self {
        self.paywalled_domains = domains.into_iter().map(|d| d.to_lowercase()).collect();
        self
    }

    fn is_paywalled(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        self.paywalled_domains.iter().any(|d| lower.contains(d.as_str()))
    }

    /// Probe one URL up to `rounds` times, stopping at the first failed round.
    pub async fn check_url(&self, url: &str) -> LinkCheckResult {
        let mut rounds_passed = 0;
        let mut status = None;
        let mut error = None;

        for round in 1..=self.rounds {
            let outcome = self.probe.probe(url).await;
            status = outcome.status;
            let passed = outcome.is_success() || (outcome.is_forbidden() && self.is_paywalled(url));

            if !passed {
                error = outcome
                    .error
                    .or_else(|| status.map(|s| format!("HTTP {s}")));
                debug!(url, round, status, "Link failed verification round");
                break;
            }
            rounds_passed += 1;
        }

        LinkCheckResult {
            url: url.to_string(),
            ok: rounds_passed == self.rounds,
            status,
            error,
            rounds_passed,
            rounds: self.rounds,
        }
    }
}

#[async_trait]
impl LinkVerifier for LinkChecker {
    async fn verify_all(&self, urls: &[String]) -> LinkCheckReport {
        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            results.push(self.check_url(url).await);
        }

        let report = LinkCheckReport { results };
        info!(
            total = urls.len(),
            broken = report.broken().count(),
            rounds = self.rounds,
            "Link verification complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use crate::probe::testing::ScriptedProbe;

    fn checker(probe: ScriptedProbe) -> (LinkChecker, Arc<ScriptedProbe>) {
        let probe = Arc::new(probe);
        let checker = LinkChecker::new(probe.clone())
            .with_paywalled_domains(vec!["ieee.org".into(), "jstor.org".into()]);
        (checker, probe)
    }

    #[tokio::test]
    async fn passes_all_rounds() {
        let url = "https://doc.rust-lang.org/book/";
        let (checker, probe) = checker(ScriptedProbe::new().with(url, vec![ProbeOutcome::status(200)]));
        let result = checker.check_url(url).await;
        assert!(result.ok);
        assert_eq!(result.rounds_passed, 3);
        assert_eq!(probe.calls_for(url), 3);
    }

    #[tokio::test]
    async fn flaky_link_fails_overall() {
        let url = "https://flaky.example.com/";
        let (checker, probe) = checker(ScriptedProbe::new().with(
            url,
            vec![
                ProbeOutcome::status(200),
                ProbeOutcome::status(503),
                ProbeOutcome::status(200),
            ],
        ));
        let result = checker.check_url(url).await;
        assert!(!result.ok);
        assert_eq!(result.rounds_passed, 1);
        assert_eq!(result.status, Some(503));
        assert_eq!(result.error.as_deref(), Some("HTTP 503"));
        assert_eq!(probe.calls_for(url), 2);
    }

    #[tokio::test]
    async fn paywalled_403_is_accepted() {
        let paywalled = "https://ieeexplore.ieee.org/document/123";
        let other = "https://blocked.example.com/";
        let (checker, _) = checker(
            ScriptedProbe::new()
                .with(paywalled, vec![ProbeOutcome::status(403)])
                .with(other, vec![ProbeOutcome::status(403)]),
        );
        let report = checker
            .verify_all(&[paywalled.to_string(), other.to_string()])
            .await;
        assert!(report.results[0].ok);
        assert!(!report.results[1].ok);
        assert_eq!(report.broken().count(), 1);
    }

    #[tokio::test]
    async fn connection_error_recorded() {
        let (checker, _) = checker(ScriptedProbe::new());
        let result = checker.check_url("https://nowhere.invalid/").await;
        assert!(!result.ok);
        assert_eq!(result.status, None);
        assert_eq!(result.error.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn rounds_configurable() {
        let url = "https://example.org/";
        let probe = Arc::new(ScriptedProbe::new().with(url, vec![ProbeOutcome::status(200)]));
        let checker = LinkChecker::new(probe.clone()).with_rounds(1);
        assert!(checker.check_url(url).await.ok);
        assert_eq!(probe.calls_for(url), 1);
    }
}
