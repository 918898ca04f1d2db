//! Generator construction from configuration.
//!
//! Picks Azure when an `[azure]` block is configured, otherwise an
//! OpenAI-compatible endpoint at `api_url`, and wraps the result in the
//! retrying generator.

use crate::openai_compat::OpenAiCompatGenerator;
use crate::retry::RetryingGenerator;
use std::sync::Arc;
use tracing::info;
use weekforge_config::AppConfig;
use weekforge_core::error::GenerationError;
use weekforge_core::provider::TextGenerator;

/// Build the generator every role shares for a run.
pub fn build_generator(config: &AppConfig) -> Result<Arc<dyn TextGenerator>, GenerationError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        GenerationError::NotConfigured(
            "no API key; set WEEKFORGE_API_KEY or OPENAI_API_KEY, or api_key in weekforge.toml"
                .into(),
        )
    })?;

    let base: Arc<dyn TextGenerator> = match &config.azure {
        Some(azure) => {
            info!(deployment = %azure.deployment, "Using Azure OpenAI deployment");
            Arc::new(OpenAiCompatGenerator::azure(
                &azure.endpoint,
                &azure.deployment,
                &azure.api_version,
                api_key,
            ))
        }
        None => {
            info!(url = %config.api_url, model = %config.default_model, "Using OpenAI-compatible endpoint");
            Arc::new(OpenAiCompatGenerator::new(
                endpoint_name(&config.api_url),
                &config.api_url,
                api_key,
            ))
        }
    };

    Ok(Arc::new(RetryingGenerator::new(base)))
}

fn endpoint_name(api_url: &str) -> &'static str {
    if api_url.contains("api.openai.com") {
        "openai"
    } else if api_url.contains("openrouter.ai") {
        "openrouter"
    } else if api_url.contains("localhost") || api_url.contains("127.0.0.1") {
        "local"
    } else {
        "custom"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weekforge_config::AzureConfig;

    #[test]
    fn missing_key_is_not_configured() {
        let config = AppConfig::default();
        assert!(matches!(
            build_generator(&config),
            Err(GenerationError::NotConfigured(_))
        ));
    }

    #[test]
    fn standard_endpoint_is_wrapped_in_retry() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let generator = build_generator(&config).unwrap();
        assert_eq!(generator.name(), "retry(openai)");
    }

    #[test]
    fn azure_block_selects_azure() {
        let config = AppConfig {
            api_key: Some("key".into()),
            azure: Some(AzureConfig {
                endpoint: "https://example.openai.azure.com".into(),
                deployment: "gpt4o".into(),
                api_version: "2024-08-01-preview".into(),
            }),
            ..AppConfig::default()
        };
        let generator = build_generator(&config).unwrap();
        assert_eq!(generator.name(), "retry(azure)");
    }

    #[test]
    fn endpoint_names() {
        assert_eq!(endpoint_name("http://localhost:11434/v1"), "local");
        assert_eq!(endpoint_name("https://openrouter.ai/api/v1"), "openrouter");
        assert_eq!(endpoint_name("https://llm.example.edu/v1"), "custom");
    }
}
