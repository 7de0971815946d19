//! Prompt templating and the recursive design-expansion orchestrator:
//! decompose a design request into sub-models, recurse until every branch
//! bottoms out in a generated leaf circuit, and keep the registry merged
//! and persisted along the way.

pub mod expand;
pub mod prompts;
pub mod template;

pub use expand::{DesignExpander, ExpandOptions};
pub use prompts::{append_sub_model_summaries, PromptKind, PromptLibrary};
