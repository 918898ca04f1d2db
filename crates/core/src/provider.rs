//! Text generation trait: the abstraction over LLM backends.
//!
//! A generator takes a system text and a user text and returns generated
//! text. Retry and backoff belong to the implementation, never to the caller.
//!
//! Implementations: OpenAI-compatible endpoints, Azure deployments, and a
//! retrying wrapper around either.

use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The model or deployment to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// System instruction text
    pub system: String,

    /// User content, already packed to fit the context budget
    pub user: String,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            user: user.into(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    /// The generated text
    pub text: String,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core text generation trait.
///
/// Every role (writer, reviewers, coherence reviewer) talks to the model
/// through this trait without knowing which backend serves it.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// A human-readable name for this generator (e.g., "openai", "azure").
    fn name(&self) -> &str;

    /// Send a request and get the complete generated text.
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError>;

    /// Health check: can we reach the service?
    async fn health_check(&self) -> Result<bool, GenerationError> {
        Ok(true)
    }
}
