use async_trait::async_trait;
use circuitgen_core::{CircuitGenError, LlmClient, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for OpenAI-compatible chat-completions endpoints
/// (DeepSeek, Moonshot, Ollama, LM Studio, custom gateways).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatibleConfig {
    /// Base URL including the API version segment (e.g. "https://api.deepseek.com/v1").
    pub base_url: String,
    /// Model to request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum retries for failed requests.
    pub max_retries: u32,
    /// Optional API key (local servers usually run without one).
    pub api_key: Option<String>,
    /// Provider name for diagnostics.
    pub provider_name: String,
}

impl Default for OpenAiCompatibleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "local-model".to_string(),
            temperature: 0.3,
            timeout_secs: 180,
            max_retries: 3,
            api_key: None,
            provider_name: "openai-compatible".to_string(),
        }
    }
}

impl OpenAiCompatibleConfig {
    /// Config for the DeepSeek API.
    pub fn deepseek(model: String, api_key: String) -> Self {
        Self {
            base_url: "https://api.deepseek.com/v1".to_string(),
            model,
            api_key: Some(api_key),
            provider_name: "deepseek".to_string(),
            ..Default::default()
        }
    }

    /// Config for the Moonshot (Kimi) API.
    pub fn moonshot(model: String, api_key: String) -> Self {
        Self {
            base_url: "https://api.moonshot.cn/v1".to_string(),
            model,
            api_key: Some(api_key),
            provider_name: "moonshot".to_string(),
            ..Default::default()
        }
    }

    /// Config for a custom endpoint.
    pub fn custom(base_url: String, model: String, provider_name: String) -> Self {
        Self {
            base_url,
            model,
            provider_name,
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Chat-completions client over any OpenAI-compatible endpoint.
pub struct OpenAiCompatibleClient {
    config: OpenAiCompatibleConfig,
    client: Client,
}

impl OpenAiCompatibleClient {
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CircuitGenError::Client(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OpenAiCompatibleConfig {
        &self.config
    }

    async fn send_with_retries(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, ...
                let delay = Duration::from_secs(2u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
            }

            match self.try_request(prompt).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    if attempt < self.config.max_retries {
                        warn!(
                            "{} request failed (attempt {}/{}): {}",
                            self.config.provider_name,
                            attempt + 1,
                            self.config.max_retries + 1,
                            e
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| CircuitGenError::Client("all retry attempts failed".to_string())))
    }

    async fn try_request(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.config.temperature,
            stream: false,
        };

        let mut builder = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .header("Content-Type", "application/json")
            .json(&request);

        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                CircuitGenError::Timeout(format!(
                    "{} request timed out after {}s",
                    self.config.provider_name, self.config.timeout_secs
                ))
            } else {
                CircuitGenError::Client(format!(
                    "{} request to {} failed: {}",
                    self.config.provider_name, self.config.base_url, e
                ))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CircuitGenError::Client(format!(
                "{} API error ({}): {}",
                self.config.provider_name, status, body
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            CircuitGenError::Client(format!(
                "failed to parse {} response: {}",
                self.config.provider_name, e
            ))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        // An empty completion must stay distinguishable from "segment absent"
        // downstream, so it is a client failure here.
        if content.trim().is_empty() {
            return Err(CircuitGenError::Client(format!(
                "{} returned an empty completion",
                self.config.provider_name
            )));
        }

        Ok(content)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn get_answer(&self, prompt: &str) -> Result<String> {
        debug!(
            "sending {} chars to {} ({})",
            prompt.len(),
            self.config.model,
            self.config.provider_name
        );
        let reply = self.send_with_retries(prompt).await?;
        debug!("received {} chars from {}", reply.len(), self.config.model);
        Ok(reply)
    }
}
