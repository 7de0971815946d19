use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One enumerated testbench item extracted from a reply. Either slot may be
/// absent; the ordinal is the number the reply used, kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestArtifact {
    pub ordinal: usize,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One named circuit block: a top-level design request or a sub-block
/// discovered during decomposition. `name` is the sole identity within a
/// registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignEntity {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered port tokens; order maps positionally to netlist connections.
    #[serde(default)]
    pub input_ports: Vec<String>,
    #[serde(default)]
    pub output_ports: Vec<String>,
    #[serde(default)]
    pub parameters: Option<String>,
    #[serde(default)]
    pub parameter_description: Option<String>,
    /// Generated netlist source; absent until a generation pass succeeds.
    /// Only the explicit regeneration operation may replace it.
    #[serde(default)]
    pub implementation: Option<String>,
    #[serde(default)]
    pub tests: Vec<TestArtifact>,
    /// Names of the sub-models this block is composed of.
    #[serde(default)]
    pub sub_model_names: Vec<String>,
}

impl DesignEntity {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_ports: Vec<String>,
        output_ports: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_ports,
            output_ports,
            ..Default::default()
        }
    }

    /// An otherwise-empty entity carrying only a name, used as a merge
    /// payload against the registry.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_composite(&self) -> bool {
        !self.sub_model_names.is_empty()
    }

    pub fn is_resolved_leaf(&self) -> bool {
        self.sub_model_names.is_empty() && self.implementation.is_some()
    }

    /// Field-wise merge: keep existing non-absent values, adopt `other`'s
    /// values into absent slots only. Empty sequences count as absent.
    /// Idempotent; never overwrites a populated field.
    pub fn merge_from(&mut self, other: DesignEntity) {
        if self.description.is_none() {
            self.description = other.description;
        }
        if self.input_ports.is_empty() {
            self.input_ports = other.input_ports;
        }
        if self.output_ports.is_empty() {
            self.output_ports = other.output_ports;
        }
        if self.parameters.is_none() {
            self.parameters = other.parameters;
        }
        if self.parameter_description.is_none() {
            self.parameter_description = other.parameter_description;
        }
        if self.implementation.is_none() {
            self.implementation = other.implementation;
        }
        if self.tests.is_empty() {
            self.tests = other.tests;
        }
        if self.sub_model_names.is_empty() {
            self.sub_model_names = other.sub_model_names;
        }
    }

    /// Placeholder map for prompt rendering. Keys mirror the bracketed
    /// tokens the prompt templates use; an absent value leaves the token
    /// verbatim in the rendered prompt.
    pub fn prompt_bindings(&self) -> HashMap<&'static str, Option<String>> {
        HashMap::from([
            ("Model", Some(self.name.clone())),
            ("Description", self.description.clone()),
            ("InputNode", join_ports(&self.input_ports)),
            ("OutputNode", join_ports(&self.output_ports)),
            ("Parameter", self.parameters.clone()),
            ("Parameter_Des", self.parameter_description.clone()),
            ("ModelCode", self.implementation.clone()),
        ])
    }
}

fn join_ports(ports: &[String]) -> Option<String> {
    if ports.is_empty() {
        None
    } else {
        Some(ports.join(", "))
    }
}

/// Split a comma-separated port declaration line into ordered tokens.
pub fn split_ports(line: &str) -> Vec<String> {
    line.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
