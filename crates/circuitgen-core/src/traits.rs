use async_trait::async_trait;

use crate::error::Result;

/// An LLM endpoint: one prompt in, one full reply out. The orchestrator
/// treats the call as its sole suspension point.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Identifier of the model variant behind this client.
    fn model_name(&self) -> &str;

    /// Send a prompt and return the model's reply.
    ///
    /// Failures (network, quota, malformed or empty completion) must be
    /// errors, never an empty string, so callers can tell "call failed"
    /// apart from "artifact not produced".
    async fn get_answer(&self, prompt: &str) -> Result<String>;
}
