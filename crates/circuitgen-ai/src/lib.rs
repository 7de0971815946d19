//! LLM clients for the circuit-generation loop. Everything speaks the
//! OpenAI-compatible chat-completions protocol; the factory maps provider
//! names from configuration onto concrete endpoints.

pub mod factory;
pub mod openai_compatible;

pub use factory::LlmClientFactory;
pub use openai_compatible::{OpenAiCompatibleClient, OpenAiCompatibleConfig};
