use std::sync::Arc;

use circuitgen_core::{CircuitGenError, LlmClient, LlmSettings, Result};

use crate::openai_compatible::{OpenAiCompatibleClient, OpenAiCompatibleConfig};

/// Environment fallback for the API key when the config leaves it unset.
const API_KEY_ENV: &str = "CIRCUITGEN_API_KEY";

/// Creates LLM clients from configuration.
pub struct LlmClientFactory;

impl LlmClientFactory {
    pub fn create_from_config(settings: &LlmSettings) -> Result<Arc<dyn LlmClient>> {
        let provider = settings.provider.to_lowercase();
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok());

        let mut config = match provider.as_str() {
            "deepseek" => {
                OpenAiCompatibleConfig::deepseek(settings.model.clone(), require_key(api_key, "deepseek")?)
            }
            "moonshot" | "kimi" => {
                OpenAiCompatibleConfig::moonshot(settings.model.clone(), require_key(api_key, "moonshot")?)
            }
            "ollama" => {
                let base_url = settings
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434/v1".to_string());
                OpenAiCompatibleConfig::custom(base_url, settings.model.clone(), "ollama".to_string())
            }
            "lmstudio" => {
                let base_url = settings
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:1234/v1".to_string());
                OpenAiCompatibleConfig::custom(base_url, settings.model.clone(), "lmstudio".to_string())
            }
            "openai-compatible" => {
                let base_url = settings.base_url.clone().ok_or_else(|| {
                    CircuitGenError::Config(
                        "llm.base_url is required for the openai-compatible provider".to_string(),
                    )
                })?;
                let mut config = OpenAiCompatibleConfig::custom(
                    base_url,
                    settings.model.clone(),
                    "openai-compatible".to_string(),
                );
                config.api_key = api_key;
                config
            }
            other => {
                return Err(CircuitGenError::Config(format!(
                    "unsupported LLM provider: {}. Available providers: {}",
                    other,
                    Self::supported_providers().join(", ")
                )))
            }
        };

        config.temperature = settings.temperature;
        config.timeout_secs = settings.timeout_secs;
        config.max_retries = settings.max_retries;

        Ok(Arc::new(OpenAiCompatibleClient::new(config)?))
    }

    pub fn supported_providers() -> Vec<String> {
        ["deepseek", "moonshot", "ollama", "lmstudio", "openai-compatible"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

fn require_key(api_key: Option<String>, provider: &str) -> Result<String> {
    api_key.ok_or_else(|| {
        CircuitGenError::Config(format!(
            "{} API key not found. Set llm.api_key in config or the {} environment variable",
            provider, API_KEY_ENV
        ))
    })
}
