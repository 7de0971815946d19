use std::{
    env,
    path::{Path, PathBuf},
};

use config as cfg;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CircuitGenError, Result};

/// LLM endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Provider: "deepseek", "moonshot", "ollama", "lmstudio" or
    /// "openai-compatible" (custom endpoint, requires `base_url`).
    #[serde(default = "LlmSettings::default_provider")]
    pub provider: String,

    /// Model identifier (e.g. "deepseek-chat", "moonshot-v1-8k").
    #[serde(default = "LlmSettings::default_model")]
    pub model: String,

    /// Base URL for custom OpenAI-compatible endpoints.
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key; CIRCUITGEN_API_KEY in the environment takes over when unset.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "LlmSettings::default_temperature")]
    pub temperature: f32,

    /// Bound on a single LLM call, enforced at the orchestrator.
    #[serde(default = "LlmSettings::default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "LlmSettings::default_max_retries")]
    pub max_retries: u32,
}

impl LlmSettings {
    fn default_provider() -> String {
        "deepseek".to_string()
    }

    fn default_model() -> String {
        "deepseek-chat".to_string()
    }

    fn default_temperature() -> f32 {
        0.3
    }

    fn default_timeout_secs() -> u64 {
        180
    }

    fn default_max_retries() -> u32 {
        3
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: Self::default_provider(),
            model: Self::default_model(),
            base_url: None,
            api_key: None,
            temperature: Self::default_temperature(),
            timeout_secs: Self::default_timeout_secs(),
            max_retries: Self::default_max_retries(),
        }
    }
}

/// Prompt template files, one per operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSettings {
    #[serde(default = "PromptSettings::default_dir")]
    pub dir: PathBuf,
    #[serde(default = "PromptSettings::default_decomposition")]
    pub decomposition: String,
    #[serde(default = "PromptSettings::default_generation")]
    pub generation: String,
    #[serde(default = "PromptSettings::default_testbench")]
    pub testbench: String,
    #[serde(default = "PromptSettings::default_connection")]
    pub connection: String,
}

impl PromptSettings {
    fn default_dir() -> PathBuf {
        PathBuf::from("prompts")
    }

    fn default_decomposition() -> String {
        "topcircuit_generate.md".to_string()
    }

    fn default_generation() -> String {
        "circuit_generate.md".to_string()
    }

    fn default_testbench() -> String {
        "check_problems.md".to_string()
    }

    fn default_connection() -> String {
        "submodule_connect.md".to_string()
    }
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            decomposition: Self::default_decomposition(),
            generation: Self::default_generation(),
            testbench: Self::default_testbench(),
            connection: Self::default_connection(),
        }
    }
}

/// On-disk store layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Directory holding one JSON record per entity.
    #[serde(default = "StoreSettings::default_model_dir")]
    pub model_dir: PathBuf,
    /// Directory holding generated implementation and testbench files.
    #[serde(default = "StoreSettings::default_module_dir")]
    pub module_dir: PathBuf,
    /// File extension for generated code (PySpice netlists by default).
    #[serde(default = "StoreSettings::default_module_ext")]
    pub module_ext: String,
}

impl StoreSettings {
    fn default_model_dir() -> PathBuf {
        PathBuf::from("model_json")
    }

    fn default_module_dir() -> PathBuf {
        PathBuf::from("modules")
    }

    fn default_module_ext() -> String {
        "py".to_string()
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            model_dir: Self::default_model_dir(),
            module_dir: Self::default_module_dir(),
            module_ext: Self::default_module_ext(),
        }
    }
}

/// Knobs for the decomposition walk and the extraction grammar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionSettings {
    /// Segment leader for the generated implementation.
    #[serde(default = "ExpansionSettings::default_implementation_leader")]
    pub implementation_leader: String,
    /// Segment leader for the parameter description.
    #[serde(default = "ExpansionSettings::default_parameter_leader")]
    pub parameter_leader: String,
    /// Fence tag marking implementation code in replies.
    #[serde(default = "ExpansionSettings::default_code_tag")]
    pub code_tag: String,
    /// Fence tag marking prose descriptions in replies.
    #[serde(default = "ExpansionSettings::default_doc_tag")]
    pub doc_tag: String,
    /// Upper bound on the recursion depth of one expansion run.
    #[serde(default = "ExpansionSettings::default_max_depth")]
    pub max_depth: usize,
}

impl ExpansionSettings {
    fn default_implementation_leader() -> String {
        "NetList Code".to_string()
    }

    fn default_parameter_leader() -> String {
        "Parameter_Explanation".to_string()
    }

    fn default_code_tag() -> String {
        "python".to_string()
    }

    fn default_doc_tag() -> String {
        "markdown".to_string()
    }

    fn default_max_depth() -> usize {
        8
    }
}

impl Default for ExpansionSettings {
    fn default() -> Self {
        Self {
            implementation_leader: Self::default_implementation_leader(),
            parameter_leader: Self::default_parameter_leader(),
            code_tag: Self::default_code_tag(),
            doc_tag: Self::default_doc_tag(),
            max_depth: Self::default_max_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "LoggingSettings::default_level")]
    pub level: String,
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub prompts: PromptSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub expansion: ExpansionSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn default_env() -> String {
        env::var("APP_ENV")
            .ok()
            .or_else(|| env::var("RUST_ENV").ok())
            .unwrap_or_else(|| "development".to_string())
    }

    /// Default configuration directory.
    ///
    /// Priority order: ~/.circuitgen/, then ./config/, then the current
    /// directory.
    pub fn default_config_dir() -> PathBuf {
        if let Some(home_dir) = dirs::home_dir() {
            let user_dir = home_dir.join(".circuitgen");
            if user_dir.exists() {
                info!("using config directory: {:?}", user_dir);
                return user_dir;
            }
        }

        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let project_config = cwd.join("config");
        if project_config.exists() {
            info!("using config directory: {:?}", project_config);
            return project_config;
        }

        cwd
    }

    /// Layer default.toml, {env}.toml, local.toml and CIRCUITGEN__* env vars,
    /// then validate.
    pub fn load_from_sources(config_dir: &Path, env_name: &str) -> Result<Settings> {
        let builder = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.toml", env_name))).required(false),
            )
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(cfg::Environment::with_prefix("CIRCUITGEN").separator("__"));

        let settings: Settings = builder
            .build()
            .map_err(|e| CircuitGenError::Config(format!("building configuration: {e}")))?
            .try_deserialize()
            .map_err(|e| CircuitGenError::Config(format!("deserializing configuration: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from the default directory and environment.
    pub fn load() -> Result<Settings> {
        Self::load_from_sources(&Self::default_config_dir(), &Self::default_env())
    }

    pub fn validate(&self) -> Result<()> {
        ensure(!self.llm.model.trim().is_empty(), "llm.model cannot be empty")?;
        ensure(self.llm.timeout_secs > 0, "llm.timeout_secs must be > 0")?;
        ensure(
            (0.0..=2.0).contains(&self.llm.temperature),
            "llm.temperature must be within 0.0..=2.0",
        )?;
        ensure(
            self.expansion.max_depth >= 1,
            "expansion.max_depth must be >= 1",
        )?;
        ensure(
            !self.expansion.implementation_leader.trim().is_empty(),
            "expansion.implementation_leader cannot be empty",
        )?;
        ensure(
            !self.store.module_ext.trim().is_empty(),
            "store.module_ext cannot be empty",
        )?;
        Ok(())
    }
}

fn ensure(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(CircuitGenError::Config(message.to_string()))
    }
}
