//! HTTP reachability probing shared by the link and dataset checkers.

use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

const USER_AGENT: &str = "weekforge/0.1 LinkChecker (+https://github.com/weekforge/weekforge)";

/// What one probe of one URL observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: Option<u16>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn status(code: u16) -> Self {
        Self {
            status: Some(code),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(code) if (200..300).contains(&code))
    }

    pub fn is_forbidden(&self) -> bool {
        self.status == Some(403)
    }
}

/// Fetches the status of a URL.
#[async_trait]
pub trait UrlProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// Probes with HEAD, falling back to GET when HEAD errors or returns >= 400.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

#[async_trait]
impl UrlProbe for HttpProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        match self.client.head(url).send().await {
            Ok(response) if response.status().as_u16() < 400 => {
                return ProbeOutcome::status(response.status().as_u16());
            }
            Ok(response) => {
                trace!(url, status = response.status().as_u16(), "HEAD rejected, retrying with GET");
            }
            Err(e) => {
                trace!(url, error = %e, "HEAD failed, retrying with GET");
            }
        }

        match self.client.get(url).send().await {
            Ok(response) => ProbeOutcome::status(response.status().as_u16()),
            Err(e) => ProbeOutcome::failed(e.to_string()),
        }
    }
}
