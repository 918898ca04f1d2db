//! OpenAI-compatible text generator.
//!
//! Works with: OpenAI, Azure OpenAI deployments, OpenRouter, Ollama, vLLM,
//! and any endpoint that exposes `/chat/completions`.
//!
//! Each call sends exactly two messages (system, user) and returns the
//! first choice's content. Retrying is left to [`crate::RetryingGenerator`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use weekforge_core::error::GenerationError;
use weekforge_core::provider::{Generation, GenerationRequest, TextGenerator, Usage};

/// How requests authenticate and where they are routed.
#[derive(Debug, Clone)]
enum Endpoint {
    /// `Authorization: Bearer` against `{base_url}/chat/completions`
    Standard { base_url: String },
    /// `api-key` header against a fixed deployment; the request's model is ignored
    Azure {
        endpoint: String,
        deployment: String,
        api_version: String,
    },
}

/// A generator backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiCompatGenerator {
    name: String,
    endpoint: Endpoint,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatGenerator {
    /// Create a generator for any OpenAI-compatible base URL.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: Endpoint::Standard {
                base_url: base_url.into().trim_end_matches('/').to_string(),
            },
            api_key: api_key.into(),
            client: http_client(),
        }
    }

    /// Create an OpenAI generator (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create a generator for an Azure OpenAI deployment.
    pub fn azure(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: "azure".into(),
            endpoint: Endpoint::Azure {
                endpoint: endpoint.into().trim_end_matches('/').to_string(),
                deployment: deployment.into(),
                api_version: api_version.into(),
            },
            api_key: api_key.into(),
            client: http_client(),
        }
    }

    fn completions_url(&self) -> String {
        match &self.endpoint {
            Endpoint::Standard { base_url } => format!("{base_url}/chat/completions"),
            Endpoint::Azure {
                endpoint,
                deployment,
                api_version,
            } => format!(
                "{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={api_version}"
            ),
        }
    }

    fn models_url(&self) -> String {
        match &self.endpoint {
            Endpoint::Standard { base_url } => format!("{base_url}/models"),
            Endpoint::Azure {
                endpoint,
                api_version,
                ..
            } => format!("{endpoint}/openai/models?api-version={api_version}"),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.endpoint {
            Endpoint::Standard { .. } => {
                builder.header("Authorization", format!("Bearer {}", self.api_key))
            }
            Endpoint::Azure { .. } => builder.header("api-key", &self.api_key),
        }
    }

    fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let messages = [
            ApiMessage {
                role: "system",
                content: &request.system,
            },
            ApiMessage {
                role: "user",
                content: &request.user,
            },
        ];

        let mut body = serde_json::json!({
            "messages": messages,
            "temperature": request.temperature,
        });

        if let Endpoint::Standard { .. } = self.endpoint {
            body["model"] = serde_json::json!(request.model);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()
        .expect("Failed to create HTTP client")
}

fn classify_status(status: u16, body: String) -> GenerationError {
    match status {
        429 => GenerationError::RateLimited {
            retry_after_secs: 5,
        },
        401 | 403 => GenerationError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => GenerationError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

fn parse_response(api_response: ApiResponse) -> Result<Generation, GenerationError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or(GenerationError::EmptyResponse)?;

    let text = choice.message.content.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let usage = api_response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(Generation {
        text,
        usage,
        model: api_response.model,
    })
}

#[async_trait]
impl TextGenerator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError> {
        if self.api_key.is_empty() {
            return Err(GenerationError::NotConfigured(format!(
                "no API key for '{}'",
                self.name
            )));
        }

        let body = self.request_body(&request);

        debug!(
            generator = %self.name,
            model = %request.model,
            system_chars = request.system.len(),
            user_chars = request.user.len(),
            "Sending completion request"
        );

        let response = self
            .authorize(self.client.post(self.completions_url()))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(e.to_string())
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Generation endpoint returned error");
            return Err(classify_status(status, error_body));
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| GenerationError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let generation = parse_response(api_response)?;
        if let Some(usage) = &generation.usage {
            debug!(
                generator = %self.name,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion received"
            );
        }
        Ok(generation)
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        let response = self
            .authorize(self.client.get(self.models_url()))
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// ── Wire types ────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    model: String,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
