//! Web search through the Tavily API.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use weekforge_core::collaborator::SearchProvider;
use weekforge_core::error::VerificationError;
use weekforge_core::run::SearchResult;

const TAVILY_URL: &str = "https://api.tavily.com/search";

pub struct TavilySearch {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            api_key: api_key.into(),
            endpoint: TAVILY_URL.into(),
            client,
        }
    }

    /// Point at a different endpoint (self-hosted proxy, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_body(&self, query: &str, top_k: usize) -> serde_json::Value {
        serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": top_k,
            "include_answer": false,
            "search_depth": "advanced",
        })
    }
}

fn into_results(response: TavilyResponse, top_k: usize) -> Vec<SearchResult> {
    response
        .results
        .into_iter()
        .filter(|r| !r.url.is_empty())
        .take(top_k)
        .map(|r| SearchResult {
            title: r.title,
            url: r.url,
            snippet: r.content,
            published_date: r.published_date,
        })
        .collect()
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, VerificationError> {
        debug!(query, top_k, "Web search");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.request_body(query, top_k))
            .send()
            .await
            .map_err(|e| VerificationError::RequestFailed {
                url: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            warn!(status, "Search API returned error");
            let reason = match status {
                401 | 403 => "authentication failed".to_string(),
                429 => "rate limit exceeded".to_string(),
                other => format!("HTTP {other}"),
            };
            return Err(VerificationError::RequestFailed {
                url: self.endpoint.clone(),
                reason,
            });
        }

        let body: TavilyResponse =
            response
                .json()
                .await
                .map_err(|e| VerificationError::InvalidResponse {
                    service: "tavily".into(),
                    reason: e.to_string(),
                })?;

        Ok(into_results(body, top_k))
    }
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default, alias = "published_time")]
    published_date: Option<String>,
}
