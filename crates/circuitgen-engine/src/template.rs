use std::collections::HashMap;
use std::fs;
use std::path::Path;

use circuitgen_core::{CircuitGenError, Result};

/// Fill `[Key]` placeholders from the bindings. Keys bound to a value
/// replace every occurrence of their token; keys bound to `None` (or not
/// bound at all) leave the token verbatim — a deliberate signal to the
/// reader that no data was available for that slot.
pub fn render(template: &str, bindings: &HashMap<&'static str, Option<String>>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in bindings {
        if let Some(value) = value {
            rendered = rendered.replace(&format!("[{}]", key), value);
        }
    }
    rendered
}

/// Read a template file. An unreadable template is a configuration defect:
/// the error carries the path and propagates to the caller.
pub fn load_template(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| CircuitGenError::Template {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
