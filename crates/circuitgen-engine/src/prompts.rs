use std::path::PathBuf;

use circuitgen_core::{DesignEntity, PromptSettings, Result};

use crate::template;

/// The prompt operations the engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// Parse a design request into sub-model declarations.
    Decomposition,
    /// Generate a leaf circuit implementation.
    Generation,
    /// Generate enumerated testbench items for an entity.
    Testbench,
    /// Connect resolved sub-models into their parent.
    Connection,
}

/// Maps each operation to its template file under the prompt directory.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    dir: PathBuf,
    decomposition: String,
    generation: String,
    testbench: String,
    connection: String,
}

impl PromptLibrary {
    pub fn from_settings(settings: &PromptSettings) -> Self {
        Self {
            dir: settings.dir.clone(),
            decomposition: settings.decomposition.clone(),
            generation: settings.generation.clone(),
            testbench: settings.testbench.clone(),
            connection: settings.connection.clone(),
        }
    }

    pub fn path(&self, kind: PromptKind) -> PathBuf {
        let file = match kind {
            PromptKind::Decomposition => &self.decomposition,
            PromptKind::Generation => &self.generation,
            PromptKind::Testbench => &self.testbench,
            PromptKind::Connection => &self.connection,
        };
        self.dir.join(file)
    }

    pub fn load(&self, kind: PromptKind) -> Result<String> {
        template::load_template(&self.path(kind))
    }
}

/// Append one `## SubModel {i}` summary block per sub-entity. The connection
/// prompt uses this so the model sees every resolved child when wiring the
/// parent together.
pub fn append_sub_model_summaries(prompt: &str, sub_models: &[DesignEntity]) -> String {
    let mut out = prompt.to_string();
    for (i, sub) in sub_models.iter().enumerate() {
        out.push_str(&format!("\n\n## SubModel {}\n", i + 1));
        out.push_str(&format!("Model: {}\n", sub.name));
        out.push_str(&format!(
            "Description: {}\n",
            sub.description.as_deref().unwrap_or("")
        ));
        out.push_str(&format!("Input Nodes: {}\n", sub.input_ports.join(", ")));
        out.push_str(&format!("Output Nodes: {}\n", sub.output_ports.join(", ")));
        out.push_str(&format!(
            "Parameters: {}\n",
            sub.parameters.as_deref().unwrap_or("")
        ));
    }
    out
}
