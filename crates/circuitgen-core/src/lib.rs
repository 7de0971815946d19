pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use config::{
    ExpansionSettings, LlmSettings, LoggingSettings, PromptSettings, Settings, StoreSettings,
};
pub use error::{CircuitGenError, Result};
pub use traits::LlmClient;
pub use types::{split_ports, DesignEntity, TestArtifact};
